// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use frame_capture::{CaptureConfig, CaptureError, Compression, ImageFormat};
use std::path::PathBuf;

fn temp_file(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("frame-capture-config-{}", uuid::Uuid::new_v4()))
        .join(name)
}

#[test]
fn test_config_default() {
    let config = CaptureConfig::default();

    assert_eq!(config.num_digits, 6);
    assert_eq!((config.frame_width, config.frame_height), (640, 480));
    assert_eq!(config.sub_directory, "color");
    assert_eq!(config.file_prefix, "img");
    assert_eq!(config.image_format, ImageFormat::Png);
    assert!(!config.float_capture, "8-bit capture should be the default");
    assert!(!config.verbose);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_save_and_load() {
    let path = temp_file("config.json");
    let config = CaptureConfig {
        output_dir: PathBuf::from("/data/captures"),
        image_format: ImageFormat::Jpeg,
        compression: Compression::Quality(92),
        num_digits: 4,
        target_gamma: Some(2.2),
        ..Default::default()
    };

    config.save(&path).unwrap();
    let loaded = CaptureConfig::load(&path).unwrap();
    assert_eq!(loaded, config);

    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}

#[test]
fn test_missing_fields_take_defaults() {
    let config: CaptureConfig =
        serde_json::from_str(r#"{ "image_format": "exr", "float_capture": true }"#).unwrap();
    assert_eq!(config.image_format, ImageFormat::Exr);
    assert_eq!(config.num_digits, 6);
    assert_eq!(config.compression, Compression::Default);
    assert!(config.validate().is_ok());
}

#[test]
fn test_compression_json_form() {
    let config: CaptureConfig = serde_json::from_str(
        r#"{ "image_format": "png", "compression": { "level": 0 } }"#,
    )
    .unwrap();
    assert_eq!(config.compression, Compression::Level(0));

    let config: CaptureConfig =
        serde_json::from_str(r#"{ "compression": "uncompressed" }"#).unwrap();
    assert_eq!(config.compression, Compression::Uncompressed);
}

#[test]
fn test_format_and_capture_mode_must_agree() {
    let config = CaptureConfig {
        image_format: ImageFormat::Exr,
        float_capture: false,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(CaptureError::Configuration(_))
    ));

    let config = CaptureConfig {
        image_format: ImageFormat::Png,
        float_capture: true,
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_values_are_rejected() {
    let cases = [
        CaptureConfig {
            num_digits: 0,
            ..Default::default()
        },
        CaptureConfig {
            frame_width: 0,
            ..Default::default()
        },
        CaptureConfig {
            file_prefix: "a/b".into(),
            ..Default::default()
        },
        CaptureConfig {
            worker_threads: 0,
            ..Default::default()
        },
        CaptureConfig {
            target_gamma: Some(-1.0),
            ..Default::default()
        },
        CaptureConfig {
            image_format: ImageFormat::Jpeg,
            compression: Compression::Level(6),
            ..Default::default()
        },
    ];
    for config in cases {
        assert!(config.validate().is_err(), "{:?} should be rejected", config);
    }
}

#[test]
fn test_verbose_raises_log_filter() {
    let quiet = CaptureConfig::default();
    assert!(!quiet.log_filter().contains("frame_capture=info"));

    // A config file alone enables the per-frame echo
    let path = temp_file("verbose.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"{ "verbose": true }"#).unwrap();
    let loaded = CaptureConfig::load(&path).unwrap();
    assert!(loaded.verbose);
    assert!(loaded.log_filter().contains("frame_capture=info"));

    for config in [&quiet, &loaded] {
        assert!(tracing_subscriber::EnvFilter::try_new(config.log_filter()).is_ok());
    }
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_load_reports_parse_errors() {
    let path = temp_file("broken.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        CaptureConfig::load(&path),
        Err(CaptureError::Configuration(_))
    ));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
