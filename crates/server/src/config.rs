use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Signing algorithm family used for access tokens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum SigningAlg {
    #[default]
    #[serde(alias = "hmac")]
    HMAC,
    #[serde(alias = "rsa")]
    RSA,
    #[serde(alias = "ecdsa")]
    ECDSA,
    #[serde(alias = "eddsa", alias = "EDDSA")]
    EdDSA,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub alg: SigningAlg,
    /// Base64 encoded HMAC secret, or base64 encoded PEM private key.
    pub secret: String,
    /// Base64 encoded PEM public key, required for asymmetric algorithms.
    #[serde(default)]
    pub public: Option<String>,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    /// Lifetime of an authorization code, in minutes.
    #[serde(default = "default_authorization_expires_minutes")]
    pub authorization_expires_minutes: i64,
    /// `-1` never expires, `0` rotates on every use, `>0` is a lifetime in seconds.
    #[serde(default = "default_refresh_token_expires")]
    pub refresh_token_expires: i64,
    #[serde(default = "default_pwd_cost")]
    pub pwd_cost: u32,
    #[serde(default = "default_reset_duration_days")]
    pub reset_duration_days: i64,
    #[serde(default)]
    pub basic_auth_user: Option<String>,
    #[serde(default)]
    pub basic_auth_pass: Option<String>,
}

impl AuthConfig {
    /// Authorization code lifetime in seconds.
    pub fn authorization_expires_secs(&self) -> i64 {
        self.authorization_expires_minutes * 60
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_audit_file_path")]
    pub file_path: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
    /// Versions accepted in the `Accept: application/vnd.<app>.<version>+json` header.
    #[serde(default = "default_known_versions")]
    pub known_versions: Vec<String>,
    /// Where the authorize endpoint sends the user to give consent.
    #[serde(default = "default_consent_url")]
    pub consent_url: String,
    /// Base of the link embedded in password reset emails.
    #[serde(default = "default_reset_url")]
    pub reset_url: String,
    pub auth: AuthConfig,
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl AppConfig {
    /// Media type clients must send in `Accept` for the given API version.
    pub fn media_type(&self, version: &str) -> String {
        format!("application/vnd.{}.{}+json", self.app_name, version)
    }
}

fn default_app_name() -> String {
    "tithe-declare".into()
}
fn default_database_url() -> String {
    "sqlite://tithe-declare.db?mode=rwc".into()
}
fn default_listen_addr() -> String {
    "0.0.0.0:12580".into()
}
fn default_run_migrations() -> bool {
    true
}
fn default_known_versions() -> Vec<String> {
    vec!["v1".into()]
}
fn default_consent_url() -> String {
    "//localhost/consent".into()
}
fn default_reset_url() -> String {
    "http://localhost/reset".into()
}
fn default_audit_file_path() -> String {
    "audit.jsonl".into()
}
fn default_token_ttl_hours() -> i64 {
    168
}
fn default_authorization_expires_minutes() -> i64 {
    60
}
fn default_refresh_token_expires() -> i64 {
    86400
}
fn default_pwd_cost() -> u32 {
    10
}
fn default_reset_duration_days() -> i64 {
    7
}

/// Checks the invariants serde cannot express.
pub fn validate(app: &AppConfig) -> Result<(), ConfigError> {
    if app.auth.secret.trim().is_empty() {
        return Err(ConfigError::Validation("auth.secret must be set".into()));
    }
    if !(4..=31).contains(&app.auth.pwd_cost) {
        return Err(ConfigError::Validation(
            "auth.pwd_cost must be between 4 and 31".into(),
        ));
    }
    if app.auth.token_ttl_hours <= 0 {
        return Err(ConfigError::Validation(
            "auth.token_ttl_hours must be > 0".into(),
        ));
    }
    if app.auth.refresh_token_expires < -1 {
        return Err(ConfigError::Validation(
            "auth.refresh_token_expires must be -1, 0 or a number of seconds".into(),
        ));
    }
    if app.auth.alg != SigningAlg::HMAC
        && app.auth.public.as_deref().is_none_or(|p| p.trim().is_empty())
    {
        return Err(ConfigError::Validation(format!(
            "auth.public is required for {:?}",
            app.auth.alg
        )));
    }
    if app.known_versions.is_empty() {
        return Err(ConfigError::Validation(
            "known_versions must list at least one version".into(),
        ));
    }
    if let Some(smtp) = &app.smtp
        && smtp.port == 0
    {
        return Err(ConfigError::Validation("smtp.port must be > 0".into()));
    }
    Ok(())
}

/// Load application configuration from an optional `config.yaml` plus environment overrides.
///
/// Environment variables use the `TITHE_DECLARE` prefix and `__` between nested keys,
/// e.g. `TITHE_DECLARE__AUTH__ALG=RSA` or `TITHE_DECLARE__DATABASE_URL=sqlite::memory:`.
/// A `.env` file in the working directory is honoured.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};

    let _ = dotenvy::dotenv();

    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(
            Environment::with_prefix("TITHE_DECLARE")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("known_versions")
                .try_parsing(true),
        )
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    validate(&app)?;
    Ok(app)
}

/// Convenience helper for binaries wanting the panic-on-error behaviour.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Config, File, FileFormat};

    fn from_yaml(yaml: &str) -> AppConfig {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn defaults_fill_missing_keys() {
        let app = from_yaml("auth:\n  secret: c2VjcmV0\n");
        assert_eq!(app.app_name, "tithe-declare");
        assert_eq!(app.listen_addr, "0.0.0.0:12580");
        assert_eq!(app.auth.alg, SigningAlg::HMAC);
        assert_eq!(app.auth.token_ttl_hours, 168);
        assert_eq!(app.auth.refresh_token_expires, 86400);
        assert_eq!(app.auth.pwd_cost, 10);
        assert_eq!(app.known_versions, vec!["v1".to_string()]);
        assert!(app.smtp.is_none());
        assert!(!app.audit.enabled);
        assert!(validate(&app).is_ok());
    }

    #[test]
    fn authorization_expiry_is_minutes() {
        let app = from_yaml("auth:\n  secret: c2VjcmV0\n  authorization_expires_minutes: 60\n");
        assert_eq!(app.auth.authorization_expires_secs(), 3600);
    }

    #[test]
    fn asymmetric_alg_requires_public_key() {
        let app = from_yaml("auth:\n  alg: RSA\n  secret: c2VjcmV0\n");
        assert!(matches!(validate(&app), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_out_of_range_cost() {
        let app = from_yaml("auth:\n  secret: c2VjcmV0\n  pwd_cost: 2\n");
        assert!(validate(&app).is_err());
    }

    #[test]
    fn media_type_uses_app_name() {
        let app = from_yaml("auth:\n  secret: c2VjcmV0\n");
        assert_eq!(
            app.media_type("v1"),
            "application/vnd.tithe-declare.v1+json"
        );
    }
}
