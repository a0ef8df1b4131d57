// tests/ingest_config.rs
use std::io::Write;
use std::path::PathBuf;

use aiverse::config::{AppConfig, ENV_CONFIG_PATH, ENV_NEWS_API_KEY};
use aiverse::error::ConfigError;
use aiverse::ingest::scheduler::OverlapPolicy;
use aiverse::store::UpdatePolicy;
use serial_test::serial;

#[test]
fn shipped_config_matches_defaults() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/ingest.toml");
    let cfg = AppConfig::load_from(&path).expect("shipped config parses");
    let def = AppConfig::default();

    assert_eq!(cfg.news.query, def.news.query);
    assert_eq!(cfg.news.domains, def.news.domains);
    assert_eq!(cfg.youtube.channel_ids, def.youtube.channel_ids);
    assert_eq!(cfg.classifier.labels, def.classifier.labels);
    assert_eq!(cfg.schedule.news.cadence, def.schedule.news.cadence);
    assert_eq!(cfg.schedule.youtube.cadence, def.schedule.youtube.cadence);
    assert_eq!(cfg.youtube.update_policy, UpdatePolicy::RefreshContent);
    assert_eq!(cfg.news.update_policy, UpdatePolicy::TopicsOnly);
}

#[test]
#[serial]
fn env_path_override_and_secrets_are_honoured() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[news]
page_size = 500

[schedule.news]
cadence = "0 */15 * * * *"
timezone = "Europe/Prague"
overlap = "queue"
"#
    )
    .unwrap();

    std::env::set_var(ENV_CONFIG_PATH, file.path());
    std::env::set_var(ENV_NEWS_API_KEY, "  secret-value  ");
    let cfg = AppConfig::load_default();
    std::env::remove_var(ENV_CONFIG_PATH);
    std::env::remove_var(ENV_NEWS_API_KEY);

    let cfg = cfg.unwrap();
    assert_eq!(cfg.news.page_size, 50);
    assert_eq!(cfg.schedule.news.overlap, OverlapPolicy::Queue);
    assert_eq!(cfg.schedule.news.timezone, "Europe/Prague");
    assert_eq!(cfg.secrets.news_api_key.as_deref(), Some("secret-value"));
    assert!(!format!("{:?}", cfg.secrets).contains("secret-value"));
}

#[test]
#[serial]
fn missing_env_path_is_an_error() {
    std::env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
    let res = AppConfig::load_default();
    std::env::remove_var(ENV_CONFIG_PATH);
    assert!(matches!(res, Err(ConfigError::MissingFile(_))));
}
