use super::{settings_from, Settings};

fn no_env(_key: &str) -> Option<String> {
    None
}

#[test]
fn defaults_without_file_or_env() {
    assert_eq!(settings_from(None, no_env), Settings::default());
}

#[test]
fn reads_known_keys_from_file() {
    let settings = settings_from(
        Some(
            r#"
            bind_addr = "0.0.0.0:9000"
            fixtures_dir = "./fixtures"
            max_body_bytes = 2048
            "#,
        ),
        no_env,
    );

    assert_eq!(settings.server_bind, "0.0.0.0:9000");
    assert_eq!(settings.fixtures_dir.as_deref(), Some("./fixtures"));
    assert_eq!(settings.max_body_bytes, 2048);
}

#[test]
fn app_prefixed_env_wins_over_legacy_env_and_file() {
    let settings = settings_from(Some(r#"bind_addr = "127.0.0.1:1""#), |key| match key {
        "SERVER_BIND" => Some("127.0.0.1:2".to_string()),
        "APP__BIND_ADDR" => Some("127.0.0.1:3".to_string()),
        "FIXTURES_DIR" => Some("legacy".to_string()),
        _ => None,
    });

    assert_eq!(settings.server_bind, "127.0.0.1:3");
    assert_eq!(settings.fixtures_dir.as_deref(), Some("legacy"));
}

#[test]
fn ignores_unparseable_values() {
    let settings = settings_from(Some("this is not toml"), |key| {
        (key == "APP__MAX_BODY_BYTES").then(|| "lots".to_string())
    });

    assert_eq!(settings, Settings::default());
}
