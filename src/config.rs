//! Startup configuration.
//!
//! Every key resolves in the same order: explicit environment variable, then the nested JSON
//! config file (dotted path such as `smtp.host`), then the built-in default. Configuration is
//! read once when the server starts and shared read-only afterwards.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_SUBJECT_PREFIX: &str = "[Feedback]";
pub const DEFAULT_MAIL_FROM: &str = "no-reply@youth-mh.example";
pub const DEFAULT_COLLECTION: &str = "books";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60;

/// Environment variable naming the nested config file.
pub const CONFIG_PATH_ENV: &str = "YOUTHMH_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("config file {path} is not valid JSON: {source}")]
    Parse { path: String, source: serde_json::Error },

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },

    #[error("invalid auth.users entry: {0}")]
    Users(serde_json::Error),
}

/// Raw key sources. Tests build one directly; the server uses [`ConfigSource::from_process`].
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    env: HashMap<String, String>,
    nested: Value,
}

impl ConfigSource {
    pub fn new(env: HashMap<String, String>, nested: Value) -> Self {
        Self { env, nested }
    }

    /// Snapshot the process environment and, when given, parse the nested JSON file.
    pub fn from_process(nested_path: Option<&Path>) -> Result<Self, ConfigError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        let nested = match nested_path {
            Some(p) => read_nested(p)?,
            None => Value::Null,
        };
        Ok(Self { env, nested })
    }

    /// Resolve one key: environment first, then the nested dotted path.
    pub fn lookup(&self, env_key: &str, path: &str) -> Option<String> {
        if let Some(v) = self.env.get(env_key) {
            return Some(v.clone());
        }
        let mut cur = &self.nested;
        for part in path.split('.') {
            cur = cur.get(part)?;
        }
        match cur {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn lookup_or(&self, env_key: &str, path: &str, default: &str) -> String {
        self.lookup(env_key, path).unwrap_or_else(|| default.to_string())
    }

    fn lookup_parsed<T: std::str::FromStr>(&self, env_key: &str, path: &str, default: T) -> Result<T, ConfigError> {
        match self.lookup(env_key, path) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid { key: env_key.to_string(), value: raw }),
        }
    }

    fn nested_at(&self, path: &str) -> Option<&Value> {
        let mut cur = &self.nested;
        for part in path.split('.') {
            cur = cur.get(part)?;
        }
        Some(cur)
    }
}

fn read_nested(path: &Path) -> Result<Value, ConfigError> {
    let shown = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: shown.clone(), source })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path: shown, source })
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<String>,
}

impl SmtpSettings {
    /// Port 465 speaks TLS from the first byte; every other port upgrades with STARTTLS.
    pub fn implicit_tls(&self) -> bool {
        self.port == 465
    }

    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && self.user.is_some() && self.pass.is_some()
    }
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("has_pass", &self.pass.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub to_default: String,
    pub subject_prefix: String,
    pub bulk_from: String,
}

#[derive(Clone)]
pub struct SendGridSettings {
    pub api_key: Option<String>,
}

impl std::fmt::Debug for SendGridSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendGridSettings").field("has_api_key", &self.api_key.is_some()).finish()
    }
}

#[derive(Clone)]
pub struct FirestoreSettings {
    pub project_id: Option<String>,
    pub emulator_host: Option<String>,
    pub token: Option<String>,
    pub collection: String,
}

impl std::fmt::Debug for FirestoreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreSettings")
            .field("project_id", &self.project_id)
            .field("emulator_host", &self.emulator_host)
            .field("has_token", &self.token.is_some())
            .field("collection", &self.collection)
            .finish()
    }
}

/// One configured login, password stored as an Argon2 PHC string.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    crate::identity::DEFAULT_ROLE.to_string()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub session_ttl_secs: u64,
    /// Mark the session cookie `Secure`. Turn off only when no TLS proxy sits in front and
    /// clients are not on localhost.
    pub cookie_secure: bool,
    pub smtp: SmtpSettings,
    pub mail: MailSettings,
    pub sendgrid: SendGridSettings,
    pub firestore: FirestoreSettings,
    pub users: Vec<UserRecord>,
}

impl Config {
    pub fn from_source(src: &ConfigSource) -> Result<Self, ConfigError> {
        let smtp = SmtpSettings {
            host: src.lookup_or("SMTP_HOST", "smtp.host", DEFAULT_SMTP_HOST),
            port: src.lookup_parsed("SMTP_PORT", "smtp.port", DEFAULT_SMTP_PORT)?,
            user: non_empty(src.lookup("SMTP_USER", "smtp.user")),
            pass: non_empty(src.lookup("SMTP_PASS", "smtp.pass")),
        };
        let mail = MailSettings {
            to_default: src.lookup_or("MAIL_TO_DEFAULT", "mail.to", "").trim().to_string(),
            subject_prefix: src.lookup_or("SUBJECT_PREFIX", "mail.subject_prefix", DEFAULT_SUBJECT_PREFIX),
            bulk_from: src.lookup_or("MAIL_FROM", "mail.from", DEFAULT_MAIL_FROM),
        };
        let sendgrid = SendGridSettings { api_key: non_empty(src.lookup("SENDGRID_API_KEY", "sendgrid.api_key")) };
        let firestore = FirestoreSettings {
            project_id: non_empty(src.lookup("FIRESTORE_PROJECT_ID", "firestore.project_id")),
            emulator_host: non_empty(src.lookup("FIRESTORE_EMULATOR_HOST", "firestore.emulator_host")),
            token: non_empty(src.lookup("FIRESTORE_TOKEN", "firestore.token")),
            collection: src.lookup_or("RESOURCE_COLLECTION", "firestore.collection", DEFAULT_COLLECTION),
        };
        let users = match src.nested_at("auth.users") {
            Some(v) => serde_json::from_value::<Vec<UserRecord>>(v.clone()).map_err(ConfigError::Users)?,
            None => Vec::new(),
        };
        Ok(Self {
            http_port: src.lookup_parsed("HTTP_PORT", "server.port", DEFAULT_HTTP_PORT)?,
            session_ttl_secs: src.lookup_parsed("SESSION_TTL_SECS", "session.ttl_secs", DEFAULT_SESSION_TTL_SECS)?,
            cookie_secure: src.lookup_parsed("SESSION_COOKIE_SECURE", "session.cookie_secure", true)?,
            smtp,
            mail,
            sendgrid,
            firestore,
            users,
        })
    }

    /// Load from the live process environment plus an optional nested file.
    pub fn load(nested_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_source(&ConfigSource::from_process(nested_path)?)
    }

    /// Log what is configured using presence flags only.
    pub fn log_summary(&self) {
        info!(
            target: "startup",
            http_port = self.http_port,
            cookie_secure = self.cookie_secure,
            smtp_host = %self.smtp.host,
            smtp_port = self.smtp.port,
            has_smtp_user = self.smtp.user.is_some(),
            has_smtp_pass = self.smtp.pass.is_some(),
            has_default_recipient = !self.mail.to_default.is_empty(),
            has_sendgrid_key = self.sendgrid.api_key.is_some(),
            firestore_project = ?self.firestore.project_id,
            collection = %self.firestore.collection,
            users = self.users.len(),
            "configuration loaded"
        );
    }
}
