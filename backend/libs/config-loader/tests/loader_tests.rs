use config_loader::{ConfigLoader, ConfigLoaderError};
use serde::{Deserialize, Serialize};
use serial_test::serial;
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct DatabaseSettings {
    url: String,
    max_connections: u32,
    password: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/app".to_string(),
            max_connections: 10,
            password: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct AppSettings {
    name: String,
    port: u16,
    verbose: bool,
    database: DatabaseSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            port: 50051,
            verbose: false,
            database: DatabaseSettings::default(),
        }
    }
}

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
#[serial]
fn file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "app.toml",
        r#"
name = "orders"

[database]
max_connections = 25
"#,
    );

    let settings: AppSettings = ConfigLoader::new()
        .with_defaults(&AppSettings::default())
        .with_file(&path)
        .load()
        .unwrap();

    assert_eq!(settings.name, "orders");
    assert_eq!(settings.port, 50051);
    assert_eq!(settings.database.max_connections, 25);
    assert_eq!(settings.database.url, "postgres://localhost/app");
}

#[test]
#[serial]
fn env_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "app.toml", "port = 6000\n");

    std::env::set_var("CFGTEST_PORT", "7000");
    std::env::set_var("CFGTEST_VERBOSE", "true");
    std::env::set_var("CFGTEST_DATABASE__MAX_CONNECTIONS", "40");

    let result: Result<AppSettings, _> = ConfigLoader::new()
        .with_defaults(&AppSettings::default())
        .with_file(&path)
        .with_env("CFGTEST")
        .load();

    std::env::remove_var("CFGTEST_PORT");
    std::env::remove_var("CFGTEST_VERBOSE");
    std::env::remove_var("CFGTEST_DATABASE__MAX_CONNECTIONS");

    let settings = result.unwrap();
    assert_eq!(settings.port, 7000);
    assert!(settings.verbose);
    assert_eq!(settings.database.max_connections, 40);
}

#[test]
#[serial]
fn file_reference_is_resolved_after_merge() {
    let dir = tempfile::tempdir().unwrap();
    let secret = write_file(&dir, "db_password", "hunter2\n");

    std::env::set_var(
        "CFGREF_DATABASE__PASSWORD",
        format!("file://{}", secret.display()),
    );

    let result: Result<AppSettings, _> = ConfigLoader::new()
        .with_defaults(&AppSettings::default())
        .with_env("CFGREF")
        .load();

    std::env::remove_var("CFGREF_DATABASE__PASSWORD");

    assert_eq!(result.unwrap().database.password, "hunter2");
}

#[test]
#[serial]
fn unreadable_reference_fails_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "app.yaml",
        "database:\n  password: file:///nonexistent/password\n",
    );

    let result = ConfigLoader::new()
        .with_defaults(&AppSettings::default())
        .with_file(&path)
        .load::<AppSettings>();

    match result {
        Err(ConfigLoaderError::FileRef { key, .. }) => assert_eq!(key, "database.password"),
        other => panic!("expected FileRef error, got {:?}", other),
    }
}

#[test]
#[serial]
fn type_mismatch_is_a_deserialize_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "app.json", r#"{"port": "not-a-number"}"#);

    let result = ConfigLoader::new().with_file(&path).load::<AppSettings>();
    assert!(matches!(result, Err(ConfigLoaderError::Deserialize(_))));
}
