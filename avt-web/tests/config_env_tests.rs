//! Environment-driven configuration tests
//!
//! These mutate process environment variables, so they run serially.

use clap::Parser;
use serial_test::serial;
use std::path::PathBuf;

use avt_common::config::{load_toml_config, TomlConfig};
use avt_web::config::{Args, ServiceConfig};

const VARS: &[&str] = &[
    "AVT_CONFIG",
    "AVT_PORT",
    "AVT_MAX_UPLOAD_MB",
    "AVT_CACHE_FOLDER",
    "AVT_TRANSCRIPTION_URL",
    "AVT_TRANSCRIPTION_API_KEY",
    "AVT_FFMPEG",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_env_vars_fill_arguments() {
    clear_env();
    std::env::set_var("AVT_PORT", "9911");
    std::env::set_var("AVT_MAX_UPLOAD_MB", "12");
    std::env::set_var("AVT_TRANSCRIPTION_API_KEY", "sk-test");
    std::env::set_var("AVT_FFMPEG", "/opt/ffmpeg/bin/ffmpeg");

    let args = Args::try_parse_from(["avt-web"]).unwrap();
    let config = ServiceConfig::resolve(&args, &TomlConfig::default()).unwrap();

    assert_eq!(config.port, 9911);
    assert_eq!(config.max_upload_bytes, 12 * 1024 * 1024);
    assert_eq!(config.transcription.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));

    clear_env();
}

#[test]
#[serial]
fn test_command_line_beats_env() {
    clear_env();
    std::env::set_var("AVT_PORT", "9911");

    let args = Args::try_parse_from(["avt-web", "--port", "7001"]).unwrap();
    let config = ServiceConfig::resolve(&args, &TomlConfig::default()).unwrap();
    assert_eq!(config.port, 7001);

    clear_env();
}

#[test]
#[serial]
fn test_config_file_from_env_path() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    let config_path = dir.path().join("avt.toml");
    std::fs::write(
        &config_path,
        format!(
            "port = 8088\ncache_folder = {:?}\n[transcription]\nbase_url = \"https://asr.example.com/v1\"\n",
            cache.to_string_lossy()
        ),
    )
    .unwrap();
    std::env::set_var("AVT_CONFIG", &config_path);

    let args = Args::try_parse_from(["avt-web"]).unwrap();
    let loaded = load_toml_config(args.config.as_deref()).unwrap();
    assert_eq!(loaded.source.as_deref(), Some(config_path.as_path()));

    let config = ServiceConfig::resolve(&args, &loaded.config).unwrap();
    assert_eq!(config.port, 8088);
    assert_eq!(config.cache_folder, cache);
    assert_eq!(config.transcription.base_url, "https://asr.example.com/v1");

    clear_env();
}
