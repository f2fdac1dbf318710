//! Integration tests for config file loading and cache folder initialization

use avt_common::config::{load_toml_config, CacheFolderInitializer, CacheFolderResolver};
use avt_common::Error;
use std::fs;

#[test]
fn test_load_explicit_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
        port = 9000
        max_upload_mb = 10

        [ffmpeg]
        max_concurrent = 1
        "#,
    )
    .unwrap();

    let loaded = load_toml_config(Some(&path)).unwrap();
    assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
    assert_eq!(loaded.config.port, Some(9000));
    assert_eq!(loaded.config.max_upload_mb, Some(10));
    assert_eq!(loaded.config.ffmpeg.max_concurrent, Some(1));
    assert!(loaded.config.ffmpeg.path.is_none());
}

#[test]
fn test_unparseable_config_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "port = [1, 2").unwrap();

    match load_toml_config(Some(&path)) {
        Err(Error::Config(msg)) => assert!(msg.contains("Parse")),
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
fn test_initializer_creates_nested_folder() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("a").join("b").join("cache");

    let resolver = CacheFolderResolver::new(Some(cache.clone()), None);
    let initializer = CacheFolderInitializer::new(resolver.resolve());
    initializer.ensure_directory_exists().unwrap();

    assert!(cache.is_dir());
    assert!(!cache.join(".write_probe").exists());
    assert_eq!(initializer.cache_folder(), cache.as_path());
}

#[test]
fn test_initializer_rejects_file_in_place_of_folder() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("cache");
    fs::write(&blocker, b"not a directory").unwrap();

    let initializer = CacheFolderInitializer::new(blocker);
    let result = initializer.ensure_directory_exists();
    assert!(matches!(result, Err(Error::Config(_))));
}
