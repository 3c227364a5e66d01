//! Emotion API.
//!
//! One route, `GET /emotion`, answering with the latest published result as
//! `{"emotion": <string>, "score": <number>}`. The listener thread only
//! accepts; every connection is answered on its own short-lived thread, so a
//! slow or idle client never delays other readers. Answering only clones an
//! `Arc` out of the slot, so the capture loop is never held up either.

use crate::state::EmotionSlot;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const MAX_REQUEST_BYTES: usize = 8192;

/// Port and interface the demo has always listened on.
pub const DEFAULT_API_ADDR: &str = "127.0.0.1:5000";

pub const EMOTION_PATH: &str = "/emotion";

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_API_ADDR.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    /// Stop the listener and wait for its thread.
    ///
    /// The daemon never calls this; the listener lives until the process is
    /// killed.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    slot: Arc<EmotionSlot>,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, slot: Arc<EmotionSlot>) -> Self {
        Self { cfg, slot }
    }

    /// Bind and start serving on a background thread.
    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self
            .cfg
            .addr
            .parse()
            .map_err(|e| anyhow!("invalid api address '{}': {}", self.cfg.addr, e))?;
        let listener = TcpListener::bind(configured_addr)
            .map_err(|e| anyhow!("failed to bind {}: {}", configured_addr, e))?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let slot = self.slot;
        let join = std::thread::Builder::new()
            .name("emotion-api".to_string())
            .spawn(move || {
                if let Err(err) = run_api(listener, slot, shutdown_thread) {
                    log::error!("emotion api stopped: {}", err);
                }
            })?;

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    slot: Arc<EmotionSlot>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                let slot = slot.clone();
                let spawned = std::thread::Builder::new()
                    .name("emotion-api-conn".to_string())
                    .spawn(move || {
                        if let Err(err) = handle_connection(stream, &slot) {
                            log::warn!("emotion api request from {} rejected: {}", peer, err);
                        }
                    });
                if let Err(err) = spawned {
                    log::warn!("emotion api could not serve {}: {}", peer, err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, slot: &EmotionSlot) -> Result<()> {
    // Accepted sockets inherit non-blocking mode on some platforms.
    stream.set_nonblocking(false)?;
    let request = read_request(&mut stream)?;
    log::debug!("{} {}", request.method, request.path);

    if request.method == "OPTIONS" {
        return match request.header("access-control-request-method") {
            Some(method) if !method.eq_ignore_ascii_case("GET") => {
                write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#)
            }
            _ => write_response(&mut stream, 204, "text/plain", b""),
        };
    }
    if request.method != "GET" {
        return write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#);
    }
    if request.path != EMOTION_PATH {
        return write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#);
    }

    let payload = serde_json::to_vec(&slot.snapshot())?;
    write_response(&mut stream, 200, "application/json", &payload)
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if data.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let text = String::from_utf8_lossy(&data);
    let mut lines = text.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }
    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        headers,
    })
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        204 => "HTTP/1.1 204 No Content",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    // Browser-based dashboards poll this endpoint cross-origin.
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\nAccess-Control-Allow-Origin: *\r\nAccess-Control-Allow-Methods: GET, OPTIONS\r\nAccess-Control-Allow-Headers: Content-Type\r\nConnection: close\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    headers: HashMap<String, String>,
}

impl HttpRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}
