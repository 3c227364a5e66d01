use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::api::DEFAULT_API_ADDR;
use crate::classify::{
    ClassifierSettings, DEFAULT_BACKEND, DEFAULT_FACE_MODEL_PATH, DEFAULT_FACE_THRESHOLD,
    DEFAULT_MODEL_PATH, DEFAULT_THRESHOLD,
};
use crate::ingest::{is_synthetic, CameraConfig, DEFAULT_CAMERA_DEVICE};

const DEFAULT_CAMERA_FPS: u32 = 0;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_PREVIEW_ENABLED: bool = true;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct EmotiondConfigFile {
    api: Option<ApiConfigFile>,
    camera: Option<CameraConfigFile>,
    classifier: Option<ClassifierConfigFile>,
    preview: Option<PreviewConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ApiConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    device: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ClassifierConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    face_model_path: Option<PathBuf>,
    threshold: Option<f64>,
    face_threshold: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PreviewConfigFile {
    enabled: Option<bool>,
}

/// Resolved daemon configuration.
///
/// Built from defaults, then an optional JSON file, then `EMOTIOND_*`
/// environment variables. With nothing set the daemon listens on
/// `127.0.0.1:5000`, opens camera index 1, and runs the face-gated tract
/// classifier from the models under `models/`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotiondConfig {
    pub api_addr: String,
    pub camera: CameraConfig,
    pub classifier: ClassifierSettings,
    pub preview_enabled: bool,
}

impl Default for EmotiondConfig {
    fn default() -> Self {
        Self::from_file(EmotiondConfigFile::default())
    }
}

impl EmotiondConfig {
    /// Load using the file named by `EMOTIOND_CONFIG`, if any.
    pub fn load() -> Result<Self> {
        let path = std::env::var("EMOTIOND_CONFIG")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Load using an explicit config file (or none).
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => EmotiondConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: EmotiondConfigFile) -> Self {
        let api_addr = file
            .api
            .and_then(|api| api.addr)
            .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraConfig {
            device: camera_file
                .device
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            target_fps: camera_file.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
            width: camera_file.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
        };
        let classifier_file = file.classifier.unwrap_or_default();
        let classifier = ClassifierSettings {
            backend: classifier_file
                .backend
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            model_path: classifier_file
                .model_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            face_model_path: classifier_file
                .face_model_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FACE_MODEL_PATH)),
            threshold: classifier_file.threshold.unwrap_or(DEFAULT_THRESHOLD),
            face_threshold: classifier_file
                .face_threshold
                .unwrap_or(DEFAULT_FACE_THRESHOLD),
        };
        let preview_enabled = file
            .preview
            .and_then(|preview| preview.enabled)
            .unwrap_or(DEFAULT_PREVIEW_ENABLED);
        Self {
            api_addr,
            camera,
            classifier,
            preview_enabled,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(addr) = env_value("EMOTIOND_API_ADDR") {
            self.api_addr = addr;
        }
        if let Some(device) = env_value("EMOTIOND_CAMERA") {
            self.camera.device = device;
        }
        if let Some(fps) = env_value("EMOTIOND_TARGET_FPS") {
            self.camera.target_fps = fps
                .parse()
                .map_err(|_| anyhow!("EMOTIOND_TARGET_FPS must be a non-negative integer"))?;
        }
        if let Some(backend) = env_value("EMOTIOND_BACKEND") {
            self.classifier.backend = backend;
        }
        if let Some(path) = env_value("EMOTIOND_MODEL_PATH") {
            self.classifier.model_path = PathBuf::from(path);
        }
        if let Some(path) = env_value("EMOTIOND_FACE_MODEL_PATH") {
            self.classifier.face_model_path = PathBuf::from(path);
        }
        if let Some(threshold) = env_value("EMOTIOND_THRESHOLD") {
            self.classifier.threshold = threshold
                .parse()
                .map_err(|_| anyhow!("EMOTIOND_THRESHOLD must be a number between 0 and 1"))?;
        }
        if let Some(threshold) = env_value("EMOTIOND_FACE_THRESHOLD") {
            self.classifier.face_threshold = threshold.parse().map_err(|_| {
                anyhow!("EMOTIOND_FACE_THRESHOLD must be a number between 0 and 1")
            })?;
        }
        if let Some(preview) = env_value("EMOTIOND_PREVIEW") {
            self.preview_enabled = parse_bool(&preview)
                .ok_or_else(|| anyhow!("EMOTIOND_PREVIEW must be true/false, 1/0, or on/off"))?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.api_addr
            .parse::<SocketAddr>()
            .map_err(|e| anyhow!("api address '{}' is invalid: {}", self.api_addr, e))?;

        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera width and height must be greater than zero"));
        }

        self.classifier.backend = self.classifier.backend.trim().to_lowercase();
        if !(0.0..=1.0).contains(&self.classifier.threshold) {
            return Err(anyhow!(
                "classifier threshold {} must be between 0 and 1",
                self.classifier.threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.classifier.face_threshold) {
            return Err(anyhow!(
                "face threshold {} must be between 0 and 1",
                self.classifier.face_threshold
            ));
        }
        match self.classifier.backend.as_str() {
            "tract" => {
                if self.classifier.model_path.as_os_str().is_empty() {
                    return Err(anyhow!("classifier backend 'tract' requires model_path"));
                }
                if self.classifier.face_model_path.as_os_str().is_empty() {
                    return Err(anyhow!("classifier backend 'tract' requires face_model_path"));
                }
            }
            // Hash-derived labels must never be served for a real camera.
            "stub" if !is_synthetic(&self.camera.device) => {
                return Err(anyhow!(
                    "classifier backend 'stub' only runs against stub:// sources, not camera '{}'; use backend 'tract'",
                    self.camera.device
                ));
            }
            _ => {}
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_config_file(path: &Path) -> Result<EmotiondConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_config_defaults_listen_on_port_5000_with_camera_1() {
        let cfg = EmotiondConfig::default();
        assert_eq!(cfg.api_addr, "127.0.0.1:5000");
        assert_eq!(cfg.camera.device, "/dev/video1");
        assert_eq!(cfg.classifier.backend, "tract");
        assert!(cfg.preview_enabled);
    }

    #[test]
    fn stub_backend_is_refused_for_a_real_camera() {
        let mut cfg = EmotiondConfig::default();
        cfg.classifier.backend = "stub".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("only runs against stub:// sources"));

        cfg.camera.device = "stub://desk".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
