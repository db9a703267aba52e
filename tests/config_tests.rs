use pressure_graph::config::{
    ADDR_VAR, DATA_DIR_VAR, MAX_SESSION_HOURS, SESSION_HOURS_VAR, ServerConfig,
};
use std::collections::HashMap;
use std::path::PathBuf;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_defaults() {
    let config = ServerConfig::from_lookup(|_| None);
    assert_eq!(config, ServerConfig::default());
    assert_eq!(config.bind_addr, "127.0.0.1:3000");
    assert_eq!(config.users_file(), PathBuf::from("database/users.json"));
    assert_eq!(config.session_duration().as_secs(), 24 * 3600);
}

#[test]
fn test_environment_overrides() {
    let config = ServerConfig::from_lookup(lookup_from(&[
        (ADDR_VAR, "0.0.0.0:8080"),
        (DATA_DIR_VAR, "/var/lib/pressure"),
        (SESSION_HOURS_VAR, "2"),
    ]));
    assert_eq!(config.bind_addr, "0.0.0.0:8080");
    assert_eq!(config.history_dir(), PathBuf::from("/var/lib/pressure/history"));
    assert_eq!(config.session_hours, 2);
}

#[test]
fn test_invalid_session_hours_are_ignored() {
    let config = ServerConfig::from_lookup(lookup_from(&[(SESSION_HOURS_VAR, "zero")]));
    assert_eq!(config.session_hours, 24);
    let config = ServerConfig::from_lookup(lookup_from(&[(SESSION_HOURS_VAR, "0")]));
    assert_eq!(config.session_hours, 24);
}

#[test]
fn test_positional_args_win() {
    let args = vec![
        "website".to_string(),
        "127.0.0.1:9000".to_string(),
        "data".to_string(),
    ];
    let config = ServerConfig::from_lookup(lookup_from(&[(ADDR_VAR, "0.0.0.0:8080")]))
        .with_args(&args);
    assert_eq!(config.bind_addr, "127.0.0.1:9000");
    assert_eq!(config.data_dir, PathBuf::from("data"));
}

#[test]
fn test_session_hours_are_capped() {
    let config =
        ServerConfig::from_lookup(lookup_from(&[(SESSION_HOURS_VAR, "18446744073709551615")]));
    assert_eq!(config.session_hours, MAX_SESSION_HOURS);

    let config = ServerConfig {
        session_hours: u64::MAX,
        ..ServerConfig::default()
    };
    assert_eq!(config.session_duration().as_secs(), MAX_SESSION_HOURS * 3600);
}
