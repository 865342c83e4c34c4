use std::fs;

use dues_config::{Config, ConfigError, ConfigManager};
use dues_domain::{BankAccount, DifferentialRule, DifferentialSettings};
use tempfile::tempdir;

#[test]
fn missing_file_loads_defaults() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");
    let config = manager.load().expect("load");

    assert_eq!(config, Config::default());
    assert_eq!(config.log_filter, "club_dues=info,dues_core=info");
    assert_eq!(config.notification.deposit_keywords, vec!["입금"]);
    assert!(!config.notification.enabled);
    assert!(manager.config_path().ends_with("config/config.json"));
}

#[test]
fn save_then_load_keeps_every_section() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");
    let mut config = Config::default().with_data_root(dir.path().join("data"));
    config.notification.enabled = true;
    config.notification.allowed_sources = vec!["com.kakaobank.channel".into()];
    config.bank_account = Some(BankAccount::new("카카오뱅크", "3333-01-1234567", "홍길동"));
    config.differential = DifferentialSettings::default()
        .with_rule("신입", DifferentialRule::PercentDiscount(50.0))
        .with_rule("회장", DifferentialRule::Exempt);

    manager.save(&config).expect("save");
    assert!(!manager.config_path().with_extension("json.tmp").exists());
    assert_eq!(manager.load().expect("load"), config);
    assert_eq!(config.resolve_data_root().unwrap(), dir.path().join("data"));
}

#[test]
fn partial_file_fills_defaults() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{ "notification": { "enabled": true } }"#).unwrap();

    let config = ConfigManager::new(path).load().expect("load");
    assert!(config.notification.enabled);
    assert_eq!(config.notification.deposit_keywords, vec!["입금"]);
    assert_eq!(config.log_filter, "club_dues=info,dues_core=info");
}

#[test]
fn malformed_file_is_a_serde_error() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    fs::write(&path, "not json").unwrap();

    let err = ConfigManager::new(path).load().unwrap_err();
    assert!(matches!(err, ConfigError::Serde(_)));
}

#[test]
fn load_cleans_notification_lists() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{
            "log_filter": "  ",
            "notification": {
                "deposit_keywords": [" ", ""],
                "allowed_sources": [" com.kbstar.kbbank ", "com.kbstar.kbbank", ""]
            }
        }"#,
    )
    .unwrap();

    let config = ConfigManager::new(path).load().expect("load");
    assert_eq!(config.notification.deposit_keywords, vec!["입금"]);
    assert_eq!(config.notification.allowed_sources, vec!["com.kbstar.kbbank"]);
    assert_eq!(config.log_filter, "club_dues=info,dues_core=info");
}

#[test]
fn update_persists_the_normalized_config() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");
    let stored = manager
        .update(|config| {
            config.notification.enabled = true;
            config.notification.deposit_keywords = vec![" 입금 ".into(), "입금".into(), "이체입금".into()];
        })
        .expect("update");

    assert_eq!(stored.notification.deposit_keywords, vec!["입금", "이체입금"]);
    assert_eq!(manager.load().expect("load"), stored);
}
