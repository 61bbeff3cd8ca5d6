use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use tithe_declare::config::{AppConfig, SigningAlg, SmtpConfig, validate};

#[test]
fn test_smtp_config_deserialization() {
    let yaml_content = r#"
server: "smtp.example.com"
port: 587
username: "user@example.com"
password: "secret123"
from: "noreply@example.com"
"#;

    let smtp_config: SmtpConfig = Config::builder()
        .add_source(File::from_str(yaml_content, FileFormat::Yaml))
        .build()
        .expect("Failed to build config")
        .try_deserialize()
        .expect("Failed to deserialize SMTP config");
    assert_eq!(smtp_config.server, "smtp.example.com");
    assert_eq!(smtp_config.port, 587);
    assert_eq!(smtp_config.from, "noreply@example.com");
}

#[test]
fn test_app_config_deserialization() {
    let yaml_content = r#"
app_name: "tithe-declare"
database_url: "postgres://localhost/tithe"
known_versions: ["v1", "v2"]
auth:
  alg: RSA
  secret: "cHJpdmF0ZQ=="
  public: "cHVibGlj"
  refresh_token_expires: -1
smtp:
  server: "smtp.example.com"
  port: 587
  username: "user@example.com"
  password: "secret123"
  from: "noreply@example.com"
audit:
  enabled: true
  file_path: "/var/log/tithe/audit.jsonl"
"#;

    let app_config: AppConfig = Config::builder()
        .add_source(File::from_str(yaml_content, FileFormat::Yaml))
        .build()
        .expect("Failed to build config")
        .try_deserialize()
        .expect("Failed to deserialize app config");
    assert_eq!(app_config.database_url, "postgres://localhost/tithe");
    assert_eq!(app_config.known_versions, vec!["v1", "v2"]);
    assert_eq!(app_config.auth.alg, SigningAlg::RSA);
    assert_eq!(app_config.auth.refresh_token_expires, -1);
    assert_eq!(app_config.auth.pwd_cost, 10);
    assert!(app_config.smtp.is_some());
    assert!(app_config.audit.enabled);
    assert!(validate(&app_config).is_ok());
}

#[test]
fn test_environment_overrides_file() {
    let yaml_content = r#"
auth:
  secret: "c2VjcmV0"
"#;
    let env: HashMap<String, String> = [
        ("TITHE_DECLARE__LISTEN_ADDR", "127.0.0.1:9000"),
        ("TITHE_DECLARE__AUTH__PWD_COST", "12"),
        ("TITHE_DECLARE__KNOWN_VERSIONS", "v1,v2"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let app_config: AppConfig = Config::builder()
        .add_source(File::from_str(yaml_content, FileFormat::Yaml))
        .add_source(
            Environment::with_prefix("TITHE_DECLARE")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("known_versions")
                .try_parsing(true)
                .source(Some(env)),
        )
        .build()
        .expect("Failed to build config")
        .try_deserialize()
        .expect("Failed to deserialize app config");
    assert_eq!(app_config.listen_addr, "127.0.0.1:9000");
    assert_eq!(app_config.auth.pwd_cost, 12);
    assert_eq!(app_config.known_versions, vec!["v1", "v2"]);
}

#[test]
fn test_missing_secret_fails_validation() {
    let yaml_content = r#"
auth:
  secret: "   "
"#;
    let app_config: AppConfig = Config::builder()
        .add_source(File::from_str(yaml_content, FileFormat::Yaml))
        .build()
        .unwrap()
        .try_deserialize()
        .unwrap();
    let err = validate(&app_config).unwrap_err();
    assert!(err.to_string().contains("auth.secret"));
}
