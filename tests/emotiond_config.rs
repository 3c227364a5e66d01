use std::path::Path;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use emotion_beacon::config::EmotiondConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "EMOTIOND_CONFIG",
        "EMOTIOND_API_ADDR",
        "EMOTIOND_CAMERA",
        "EMOTIOND_TARGET_FPS",
        "EMOTIOND_BACKEND",
        "EMOTIOND_MODEL_PATH",
        "EMOTIOND_FACE_MODEL_PATH",
        "EMOTIOND_THRESHOLD",
        "EMOTIOND_FACE_THRESHOLD",
        "EMOTIOND_PREVIEW",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn zero_config_load_uses_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = EmotiondConfig::load().expect("load config");
    assert_eq!(cfg, EmotiondConfig::default());
    assert_eq!(cfg.api_addr, "127.0.0.1:5000");
    assert_eq!(cfg.camera.device, "/dev/video1");
    assert_eq!(cfg.camera.target_fps, 0);
    assert_eq!(cfg.classifier.backend, "tract");
    assert_eq!(
        cfg.classifier.model_path,
        Path::new("models/emotion-ferplus-8.onnx")
    );
    assert_eq!(
        cfg.classifier.face_model_path,
        Path::new("models/version-RFB-320.onnx")
    );
    assert_eq!(cfg.classifier.threshold, 0.0);
    assert_eq!(cfg.classifier.face_threshold, 0.7);
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "api": { "addr": "0.0.0.0:8080" },
            "camera": {
                "device": "/dev/video0",
                "target_fps": 15,
                "width": 1280,
                "height": 720
            },
            "classifier": {
                "backend": "Tract",
                "model_path": "/opt/models/emotion-ferplus-8.onnx",
                "face_model_path": "/opt/models/version-RFB-320.onnx",
                "threshold": 0.35,
                "face_threshold": 0.8
            },
            "preview": { "enabled": false }
        }"#,
    );

    std::env::set_var("EMOTIOND_CONFIG", file.path());
    std::env::set_var("EMOTIOND_CAMERA", "stub://desk");
    std::env::set_var("EMOTIOND_THRESHOLD", "0.6");
    std::env::set_var("EMOTIOND_API_ADDR", "   ");

    let cfg = EmotiondConfig::load().expect("load config");

    assert_eq!(cfg.api_addr, "0.0.0.0:8080");
    assert_eq!(cfg.camera.device, "stub://desk");
    assert_eq!(cfg.camera.target_fps, 15);
    assert_eq!(cfg.camera.width, 1280);
    assert_eq!(cfg.camera.height, 720);
    assert_eq!(cfg.classifier.backend, "tract");
    assert_eq!(
        cfg.classifier.model_path,
        Path::new("/opt/models/emotion-ferplus-8.onnx")
    );
    assert_eq!(
        cfg.classifier.face_model_path,
        Path::new("/opt/models/version-RFB-320.onnx")
    );
    assert_eq!(cfg.classifier.face_threshold, 0.8);
    assert_eq!(cfg.classifier.threshold, 0.6);
    assert!(!cfg.preview_enabled);

    clear_env();
}

#[test]
fn explicit_path_takes_the_place_of_env_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(r#"{ "api": { "addr": "127.0.0.1:5050" } }"#);
    let cfg = EmotiondConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.api_addr, "127.0.0.1:5050");
    assert_eq!(cfg.camera.device, "/dev/video1");
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("EMOTIOND_THRESHOLD", "1.5");
    let err = EmotiondConfig::load().unwrap_err();
    assert!(err.to_string().contains("between 0 and 1"));
    clear_env();

    std::env::set_var("EMOTIOND_TARGET_FPS", "fast");
    let err = EmotiondConfig::load().unwrap_err();
    assert!(err.to_string().contains("EMOTIOND_TARGET_FPS"));
    clear_env();

    let file = write_config(r#"{ "classifier": { "model_path": "" } }"#);
    let err = EmotiondConfig::load_from(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("requires model_path"));
    clear_env();

    std::env::set_var("EMOTIOND_FACE_THRESHOLD", "-0.1");
    let err = EmotiondConfig::load().unwrap_err();
    assert!(err.to_string().contains("face threshold"));
    clear_env();

    std::env::set_var("EMOTIOND_API_ADDR", "localhost");
    let err = EmotiondConfig::load().unwrap_err();
    assert!(err.to_string().contains("api address"));
    clear_env();

    let file = write_config(r#"{ "camera": { "fps": 10 } }"#);
    let err = EmotiondConfig::load_from(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));
    clear_env();
}

#[test]
fn stub_classifier_is_only_accepted_for_synthetic_sources() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("EMOTIOND_BACKEND", "stub");
    let err = EmotiondConfig::load().unwrap_err();
    assert!(err.to_string().contains("only runs against stub:// sources"));
    assert!(err.to_string().contains("/dev/video1"));

    std::env::set_var("EMOTIOND_CAMERA", "/dev/video0");
    assert!(EmotiondConfig::load().is_err());

    std::env::set_var("EMOTIOND_CAMERA", "stub://demo");
    let cfg = EmotiondConfig::load().expect("stub classifier on a synthetic source");
    assert_eq!(cfg.classifier.backend, "stub");
    assert_eq!(cfg.camera.device, "stub://demo");

    clear_env();
}
