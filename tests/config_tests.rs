use simple_http_server::{ServerConfig, ServerError};
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_defaults() {
    let config = ServerConfig::default();

    assert_eq!(config.socket_address(), "127.0.0.1:8000");
    assert_eq!(config.root_dir, PathBuf::from("."));
    assert_eq!(config.index_file, "index.html");
    assert_eq!(config.accept_timeout, Duration::from_millis(250));
    assert_eq!(config.idle_timeout, Some(Duration::from_secs(30)));
    assert!(config.validate().is_ok());
}

#[test]
fn test_builders() {
    let config = ServerConfig::new(9000, "/srv/www")
        .with_address("0.0.0.0", 9001)
        .with_idle_timeout(None)
        .with_read_timeout(Duration::from_millis(50));

    assert_eq!(config.socket_address(), "0.0.0.0:9001");
    assert_eq!(config.root_dir, PathBuf::from("/srv/www"));
    assert_eq!(config.idle_timeout, None);
    assert_eq!(config.read_timeout, Duration::from_millis(50));
}

#[test]
fn test_validate_rejects_bad_values() {
    let dir = tempfile::tempdir().unwrap();

    let missing_root = ServerConfig::new(0, dir.path().join("missing"));
    assert!(matches!(missing_root.validate(), Err(ServerError::Config(_))));

    let zero_timeout = ServerConfig::new(0, dir.path()).with_accept_timeout(Duration::ZERO);
    assert!(matches!(zero_timeout.validate(), Err(ServerError::Config(_))));
}

#[test]
fn test_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.json");

    let config = ServerConfig::new(8123, dir.path()).with_idle_timeout(None);
    config.save_to_json_file(&path).unwrap();

    let loaded = ServerConfig::from_json_file(&path).unwrap();
    assert_eq!(loaded.port, 8123);
    assert_eq!(loaded.root_dir, dir.path());
    assert_eq!(loaded.idle_timeout, None);
}

#[test]
fn test_partial_json_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.json");
    std::fs::write(&path, r#"{ "port": 9999 }"#).unwrap();

    let loaded = ServerConfig::from_json_file(&path).unwrap();
    assert_eq!(loaded.port, 9999);
    assert_eq!(loaded.listen_address, "127.0.0.1");
    assert_eq!(loaded.max_line_length, 8 * 1024);

    std::fs::write(&path, "not json").unwrap();
    assert!(matches!(ServerConfig::from_json_file(&path), Err(ServerError::Json(_))));
}

#[test]
fn test_timeouts_are_milliseconds_in_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.json");
    std::fs::write(
        &path,
        r#"{ "accept_timeout": 50, "read_timeout": 1500, "idle_timeout": null }"#,
    )
    .unwrap();

    let loaded = ServerConfig::from_json_file(&path).unwrap();
    assert_eq!(loaded.accept_timeout, Duration::from_millis(50));
    assert_eq!(loaded.read_timeout, Duration::from_millis(1500));
    assert_eq!(loaded.idle_timeout, None);
    assert_eq!(loaded.shutdown_timeout, Duration::from_secs(3));

    ServerConfig::default().save_to_json_file(&path).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("\"idle_timeout\": 30000"), "got: {}", written);
    assert!(written.contains("\"accept_timeout\": 250"));
}
