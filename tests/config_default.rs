// tests/config_default.rs
use std::{env, fs};

use stream_curator::config::{app::ENV_CONFIG_PATH, load_config_default, load_config_from};

#[test]
fn explicit_path_toml_and_json() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("curator.toml");
    fs::write(
        &p_toml,
        r#"
[engine]
primary_cap = 3
backup_cap = 0
reuse_stale_alive = true

[engine.weights]
quality = 10.0
latency = 5.0

[[sources]]
file = "lists/a.m3u"
"#,
    )
    .unwrap();
    let cfg = load_config_from(&p_toml).unwrap();
    assert_eq!(cfg.engine.primary_cap, 3);
    assert_eq!(cfg.engine.backup_cap, 0);
    assert!(cfg.engine.reuse_stale_alive);
    assert_eq!(cfg.sources.len(), 1);

    let p_json = dir.path().join("curator.json");
    fs::write(&p_json, r#"{"engine": {"worker_pool_size": 2}}"#).unwrap();
    let cfg = load_config_from(&p_json).unwrap();
    assert_eq!(cfg.engine.worker_pool_size, 2);
}

#[test]
fn invalid_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();

    let latency_heavy = dir.path().join("a.toml");
    fs::write(&latency_heavy, "[engine.weights]\nquality = 1.0\nlatency = 2.0\n").unwrap();
    let err = load_config_from(&latency_heavy).unwrap_err();
    assert!(err.to_string().contains("latency weight"));

    let zero_cap = dir.path().join("b.json");
    fs::write(&zero_cap, r#"{"engine": {"primary_cap": 0}}"#).unwrap();
    assert!(load_config_from(&zero_cap).is_err());

    let garbage = dir.path().join("c.toml");
    fs::write(&garbage, "engine = [").unwrap();
    assert!(load_config_from(&garbage).is_err());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // isolate cwd so the repo's own config/ is never read
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_CONFIG_PATH);

    // 1) nothing on disk -> defaults
    let cfg = load_config_default().unwrap();
    assert_eq!(cfg.engine.worker_pool_size, 24);
    assert!(cfg.sources.is_empty());

    // 2) JSON fallback
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("curator.json"), r#"{"engine": {"worker_pool_size": 7}}"#).unwrap();
    assert_eq!(load_config_default().unwrap().engine.worker_pool_size, 7);

    // 3) TOML beats JSON
    fs::write(cfg_dir.join("curator.toml"), "[engine]\nworker_pool_size = 9\n").unwrap();
    assert_eq!(load_config_default().unwrap().engine.worker_pool_size, 9);

    // 4) env beats both
    let p_env = tmp.path().join("custom.toml");
    fs::write(&p_env, "[engine]\nworker_pool_size = 11\n").unwrap();
    env::set_var(ENV_CONFIG_PATH, &p_env);
    assert_eq!(load_config_default().unwrap().engine.worker_pool_size, 11);

    // 5) env pointing nowhere is an error, not a silent fallback
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml"));
    assert!(load_config_default().is_err());

    env::remove_var(ENV_CONFIG_PATH);
    env::set_current_dir(old).unwrap();
}
