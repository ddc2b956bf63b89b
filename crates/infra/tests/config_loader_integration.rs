//! Integration tests for configuration loader
//!
//! Loads configuration files from disk and builds a context from them.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::io::Write;
use std::path::PathBuf;

use bookline_domain::BooklineError;
use bookline_infra::{config, BooklineContext};
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("config file should be created");
    file.write_all(contents.as_bytes()).expect("config file should be written");
    path
}

#[test]
fn toml_file_builds_a_context() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("from-toml.db");
    let toml = format!(
        r#"
[database]
path = "{}"
pool_size = 3

[http]
timeout_secs = 4

[http.base_urls]
ghl = "http://127.0.0.1:9/"

[retry]
max_attempts = 3
initial_delay_ms = 50

[logging]
level = "debug"
json = true
"#,
        db_path.display()
    );
    let path = write_config(&dir, "bookline.toml", &toml);

    let config = config::load_from_file(Some(path)).expect("toml config should load");
    assert_eq!(config.database.pool_size, 3);
    assert_eq!(config.http.timeout_secs, 4);
    assert_eq!(config.http.base_urls.get("ghl").map(String::as_str), Some("http://127.0.0.1:9/"));
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.retry.initial_delay_ms, 50);
    assert!(config.logging.json);

    let context = BooklineContext::from_config(config).expect("context should build");
    context.db.health_check().expect("database should be healthy");
    assert!(db_path.exists());
}

#[test]
fn json_file_with_missing_sections_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("from-json.db");
    let json = format!(r#"{{ "database": {{ "path": "{}" }} }}"#, db_path.display());
    let path = write_config(&dir, "config.json", &json);

    let config = config::load_from_file(Some(path)).expect("json config should load");
    assert_eq!(config.database.pool_size, 8);
    assert_eq!(config.http.timeout_secs, 10);
    assert_eq!(config.retry.max_attempts, 2);
    assert_eq!(config.logging.level, "info");

    BooklineContext::from_config(config).expect("context should build");
}

#[test]
fn zero_pool_size_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "bookline.toml",
        r#"
[database]
path = "unused.db"
pool_size = 0
"#,
    );

    assert!(matches!(config::load_from_file(Some(path)), Err(BooklineError::Config(_))));
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "bookline.yaml", "database: {}\n");
    let err = config::load_from_file(Some(path)).unwrap_err();
    assert!(matches!(err, BooklineError::Config(message) if message.contains("yaml")));
}
