//! Gateway configuration.
//!
//! Loaded once at startup from a TOML file and passed down explicitly.
//! Every key has a default except `imap.server` and `imap.folder`.

use std::path::Path;
use std::time::Duration;

use popgate_core::ImapStoreConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::pop3::{InvalidCommandPolicy, SessionConfig};

/// Placeholder substituted with the POP3 account name in templates.
pub const USER_PLACEHOLDER: &str = "{user}";

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML or has unknown keys.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is missing or out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Complete gateway configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// POP3 listener.
    #[serde(default)]
    pub pop: PopConfig,
    /// IMAP backend.
    pub imap: ImapConfig,
    /// Settings store.
    #[serde(default)]
    pub settings: SettingsConfig,
    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
}

/// Minimum TLS protocol version offered to POP3 clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum TlsVersion {
    /// TLS 1.2 and 1.3.
    #[default]
    #[serde(rename = "1.2")]
    Tls12,
    /// TLS 1.3 only.
    #[serde(rename = "1.3")]
    Tls13,
}

/// `[pop]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PopConfig {
    /// Listen address.
    pub bind: String,
    /// Listen port.
    pub port: u16,
    /// Name shown in the greeting.
    pub name: String,
    /// Wrap connections in TLS.
    pub tls: bool,
    /// PEM certificate chain, required with `tls`.
    pub cert: Option<String>,
    /// PEM private key, required with `tls`.
    pub key: Option<String>,
    /// Minimum TLS version.
    pub min_tls_version: TlsVersion,
    /// Seconds a client may stay silent before it is dropped.
    pub idle_timeout_secs: u64,
    /// What happens after an invalid command in the transaction state.
    pub invalid_command: InvalidCommandPolicy,
}

impl Default for PopConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 110,
            name: "popgate".to_string(),
            tls: false,
            cert: None,
            key: None,
            min_tls_version: TlsVersion::default(),
            idle_timeout_secs: 600,
            invalid_command: InvalidCommandPolicy::default(),
        }
    }
}

/// Backend connection security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImapSecurity {
    /// Plaintext.
    None,
    /// Implicit TLS.
    #[default]
    Tls,
}

impl From<ImapSecurity> for popgate_imap::Security {
    fn from(security: ImapSecurity) -> Self {
        match security {
            ImapSecurity::None => Self::None,
            ImapSecurity::Tls => Self::Tls,
        }
    }
}

/// `[imap]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImapConfig {
    /// Backend hostname.
    pub server: String,
    /// Backend port. Defaults to 993 with TLS, 143 without.
    #[serde(default)]
    pub port: Option<u16>,
    /// Backend connection security.
    #[serde(default)]
    pub security: ImapSecurity,
    /// Backend login name template.
    #[serde(default = "default_login_format")]
    pub login_format: String,
    /// Template for the user's forward address, which is whitelisted.
    #[serde(default)]
    pub address_format: Option<String>,
    /// Curated folder name under `INBOX/`.
    pub folder: String,
    /// Connect and greeting timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Per-command timeout in seconds.
    #[serde(default = "default_io_timeout")]
    pub io_timeout_secs: u64,
}

fn default_login_format() -> String {
    USER_PLACEHOLDER.to_string()
}

const fn default_connect_timeout() -> u64 {
    30
}

const fn default_io_timeout() -> u64 {
    60
}

/// `[settings]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsConfig {
    /// `SQLite` database path; `sqlite::memory:` for a throwaway store.
    pub database: String,
    /// Regular expression account names must match.
    pub account_pattern: Option<String>,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            database: "popgate.db".to_string(),
            account_pattern: None,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "popgate=info,popgate_core=info".to_string(),
        }
    }
}

/// Substitutes the account name into a template.
#[must_use]
pub fn expand(template: &str, user: &str) -> String {
    template.replace(USER_PLACEHOLDER, user)
}

impl Config {
    /// Reads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses and validates a configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed or validated.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.imap.server.trim().is_empty() {
            return Err(ConfigError::Invalid("imap.server is empty".into()));
        }
        if self.imap.folder.trim().is_empty() {
            return Err(ConfigError::Invalid("imap.folder is empty".into()));
        }
        if self.pop.tls && (self.pop.cert.is_none() || self.pop.key.is_none()) {
            return Err(ConfigError::Invalid(
                "pop.cert and pop.key are required when pop.tls is set".into(),
            ));
        }
        if self.pop.idle_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "pop.idle_timeout_secs must be positive".into(),
            ));
        }
        if self.imap.connect_timeout_secs == 0 || self.imap.io_timeout_secs == 0 {
            return Err(ConfigError::Invalid("imap timeouts must be positive".into()));
        }
        Ok(())
    }

    /// Backend port, explicit or derived from the security mode.
    #[must_use]
    pub fn imap_port(&self) -> u16 {
        self.imap
            .port
            .unwrap_or_else(|| popgate_imap::Security::from(self.imap.security).default_port())
    }

    /// Connection settings for the IMAP mail store.
    #[must_use]
    pub fn store_config(&self) -> ImapStoreConfig {
        ImapStoreConfig {
            host: self.imap.server.clone(),
            port: self.imap_port(),
            security: self.imap.security.into(),
            connect_timeout: Duration::from_secs(self.imap.connect_timeout_secs),
            io_timeout: Duration::from_secs(self.imap.io_timeout_secs),
        }
    }

    /// Per-connection POP3 settings.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            name: self.pop.name.clone(),
            folder: self.imap.folder.clone(),
            login_format: self.imap.login_format.clone(),
            address_format: self.imap.address_format.clone(),
            idle_timeout: Duration::from_secs(self.pop.idle_timeout_secs),
            invalid_command: self.pop.invalid_command,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [imap]
        server = "imap.example.org"
        folder = "alumni"
    "#;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.pop.port, 110);
        assert_eq!(config.pop.bind, "0.0.0.0");
        assert!(!config.pop.tls);
        assert_eq!(config.pop.invalid_command, InvalidCommandPolicy::Disconnect);
        assert_eq!(config.imap.security, ImapSecurity::Tls);
        assert_eq!(config.imap_port(), 993);
        assert_eq!(config.imap.login_format, "{user}");
        assert_eq!(config.settings.database, "popgate.db");
        assert_eq!(config.log.filter, "popgate=info,popgate_core=info");

        let session = config.session_config();
        assert_eq!(session.idle_timeout, Duration::from_secs(600));
        assert_eq!(session.destination(), "INBOX/alumni");
    }

    #[test]
    fn test_full_document() {
        let config = Config::from_toml(
            r#"
            [pop]
            bind = "127.0.0.1"
            port = 995
            name = "KUmail"
            tls = true
            cert = "/etc/popgate/cert.pem"
            key = "/etc/popgate/key.pem"
            min_tls_version = "1.3"
            invalid_command = "keep-open"

            [imap]
            server = "imap.example.org"
            security = "none"
            login_format = "{user}@example.org"
            address_format = "{user}@alumni.example.org"
            folder = "alumni"
            io_timeout_secs = 10

            [settings]
            database = "sqlite::memory:"
            account_pattern = "[b-df-hj-np-tv-xz]{3}\\d{3}"
            "#,
        )
        .unwrap();

        assert_eq!(config.pop.min_tls_version, TlsVersion::Tls13);
        assert_eq!(config.pop.invalid_command, InvalidCommandPolicy::KeepOpen);
        assert_eq!(config.imap_port(), 143);

        let store = config.store_config();
        assert_eq!(store.port, 143);
        assert_eq!(store.io_timeout, Duration::from_secs(10));

        let session = config.session_config();
        assert_eq!(session.login_address("bcd123"), "bcd123@example.org");
        assert_eq!(
            session.forward_address("bcd123").as_deref(),
            Some("bcd123@alumni.example.org")
        );
    }

    #[test]
    fn test_tls_requires_material() {
        let err = Config::from_toml(&format!("[pop]\ntls = true\n{MINIMAL}")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_server() {
        assert!(matches!(
            Config::from_toml("[imap]\nfolder = \"x\"\n"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::from_toml("[imap]\nserver = \"\"\nfolder = \"x\"\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Config::from_toml(&format!("{MINIMAL}\nfolder_name = \"y\"\n")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_example_file_parses() {
        let config = Config::from_toml(include_str!("../popgate.example.toml")).unwrap();
        assert_eq!(config.imap_port(), 993);
        assert_eq!(config.pop.min_tls_version, TlsVersion::Tls12);
        let session = config.session_config();
        assert_eq!(
            session.forward_address("bcd123").as_deref(),
            Some("bcd123@alumni.example.org")
        );
    }

    #[test]
    fn test_expand() {
        assert_eq!(expand("{user}@example.org", "bcd123"), "bcd123@example.org");
        assert_eq!(expand("static", "bcd123"), "static");
    }
}
