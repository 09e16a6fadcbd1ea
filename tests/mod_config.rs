use docops::DbError;
use docops::config::{AppConfig, ConfigLayer, resolve};
use std::collections::HashMap;
use std::path::PathBuf;
use tempfile::tempdir;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> =
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
    move |k: &str| map.get(k).cloned()
}

fn write(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, body).unwrap();
    p
}

#[test]
fn defaults_when_nothing_is_set() {
    let cfg = resolve(ConfigLayer::default(), None, &[], &env_of(&[])).unwrap();
    assert_eq!(cfg, AppConfig::default());
    assert_eq!(cfg.uri, "mongodb://localhost:27017");
    assert_eq!(cfg.database, "docops");
}

#[test]
fn cli_beats_env_beats_files() {
    let dir = tempdir().unwrap();
    let file = write(
        dir.path(),
        "docops.toml",
        concat!(
            "uri = \"mongodb://file:27017\"\n",
            "database = \"from_file\"\n",
            "log_level = \"warn\"\n",
            "connect_timeout_secs = 3\n",
        ),
    );
    let env = env_of(&[("DOCOPS_URI", "memory://"), ("DOCOPS_LOG_LEVEL", "DEBUG")]);
    let cli = ConfigLayer { database: Some("from_cli".into()), ..ConfigLayer::default() };
    let cfg = resolve(cli, None, &[file], &env).unwrap();
    assert_eq!(cfg.uri, "memory://");
    assert_eq!(cfg.database, "from_cli");
    assert_eq!(cfg.log_level, "debug");
    assert_eq!(cfg.connect_timeout_secs, 3);
    assert!(cfg.warnings.is_empty());
}

#[test]
fn first_file_wins_per_field() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a.toml", "database = \"a\"\n");
    let b = write(dir.path(), "b.toml", "database = \"b\"\nuri = \"memory://\"\n");
    let missing = dir.path().join("missing.toml");
    let cfg = resolve(ConfigLayer::default(), None, &[missing, a, b], &env_of(&[])).unwrap();
    assert_eq!(cfg.database, "a");
    assert_eq!(cfg.uri, "memory://");
}

#[test]
fn password_in_file_uri_warns() {
    let dir = tempdir().unwrap();
    let file = write(dir.path(), "docops.toml", "uri = \"mongodb://app:hunter2@db:27017\"\n");
    let cfg = resolve(ConfigLayer::default(), None, &[file], &env_of(&[])).unwrap();
    assert_eq!(cfg.warnings.len(), 1);
    assert!(cfg.warnings[0].contains("password"));
    assert!(!cfg.warnings[0].contains("hunter2"));
}

#[test]
fn explicit_config_must_exist_and_parse() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let explicit = Some(missing.as_path());
    let paths = [missing.clone()];
    let err = resolve(ConfigLayer::default(), explicit, &paths, &env_of(&[])).unwrap_err();
    assert!(matches!(err, DbError::Config(_)));

    let broken = write(dir.path(), "broken.toml", "uri = ");
    let explicit = Some(broken.as_path());
    assert!(resolve(ConfigLayer::default(), explicit, &[broken.clone()], &env_of(&[])).is_err());

    // A broken file found by search is skipped with a warning
    let cfg = resolve(ConfigLayer::default(), None, &[broken], &env_of(&[])).unwrap();
    assert_eq!(cfg.warnings.len(), 1);
}

#[test]
fn bad_env_values_are_config_errors() {
    let timeout = env_of(&[("DOCOPS_CONNECT_TIMEOUT_SECS", "soon")]);
    assert!(matches!(
        resolve(ConfigLayer::default(), None, &[], &timeout),
        Err(DbError::Config(_))
    ));
    let level = env_of(&[("DOCOPS_LOG_LEVEL", "chatty")]);
    assert!(matches!(resolve(ConfigLayer::default(), None, &[], &level), Err(DbError::Config(_))));
}

#[test]
fn store_config_carries_timeout() {
    let cfg = AppConfig { connect_timeout_secs: 4, ..AppConfig::default() };
    assert_eq!(cfg.store_config().connect_timeout, std::time::Duration::from_secs(4));
    assert_eq!(cfg.store_config().uri, cfg.uri);
}
