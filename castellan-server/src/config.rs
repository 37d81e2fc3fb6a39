//! Configuration loading: a TOML file overridden by `CASTELLAN__`-prefixed
//! environment variables (double underscore nesting, e.g.
//! `CASTELLAN__HTTP__PORT`), following the `dotenvy`-at-dev-time /
//! env-at-prod pattern the inherited example binaries already used.

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid environment override {key}: {reason}")]
    InvalidOverride { key: String, reason: String },
}

/// One `[{id, certFile, keyFile}]` PKI entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PkiKeyConfig {
    pub id: String,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub issuer: String,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
}

fn default_access_ttl_secs() -> u64 {
    3600
}

fn default_refresh_ttl_secs() -> u64 {
    60 * 60 * 24 * 30
}

#[derive(Debug, Clone, Deserialize)]
pub struct CryptoConfig {
    /// Hex-encoded AES-256-GCM key used for the client-secret
    /// encrypt-at-rest envelope.
    pub encryption_key_hex: String,
    pub pki_keys: Vec<PkiKeyConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    pub directory: PathBuf,
    pub default_authentication_graph_id: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// The top-level configuration document, covering every key consumed at
/// bootstrap: graph directory, default authentication flow id, JWT issuer +
/// validity, HTTP host/port, the crypto encryption key, the PKI key list,
/// and the observability toggle.
#[derive(Debug, Clone, Deserialize)]
pub struct CastellanConfig {
    #[serde(default)]
    pub http: HttpConfig,
    pub token: TokenConfig,
    pub crypto: CryptoConfig,
    pub graph: GraphConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl CastellanConfig {
    /// Loads a TOML document at `path`, then applies any `CASTELLAN__...`
    /// environment overrides on top. `.env` (dev-time convenience) is
    /// loaded by the caller before this runs.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: CastellanConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = std::env::var("CASTELLAN__HTTP__HOST") {
            self.http.host = host;
        }
        if let Ok(port) = std::env::var("CASTELLAN__HTTP__PORT") {
            self.http.port = port.parse().map_err(|_| ConfigError::InvalidOverride {
                key: "CASTELLAN__HTTP__PORT".to_string(),
                reason: "not a valid u16".to_string(),
            })?;
        }
        if let Ok(issuer) = std::env::var("CASTELLAN__TOKEN__ISSUER") {
            self.token.issuer = issuer;
        }
        if let Ok(audience) = std::env::var("CASTELLAN__TOKEN__AUDIENCE") {
            self.token.audience = Some(audience);
        }
        if let Ok(key) = std::env::var("CASTELLAN__CRYPTO__ENCRYPTION_KEY_HEX") {
            self.crypto.encryption_key_hex = key;
        }
        if let Ok(dir) = std::env::var("CASTELLAN__GRAPH__DIRECTORY") {
            self.graph.directory = PathBuf::from(dir);
        }
        if let Ok(flag) = std::env::var("CASTELLAN__OBSERVABILITY__ENABLED") {
            self.observability.enabled = flag == "1" || flag.eq_ignore_ascii_case("true");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let file = write_temp_config(
            r#"
            [token]
            issuer = "https://idp.example"

            [crypto]
            encryption_key_hex = "00112233445566778899aabbccddeeff00112233445566778899aabbccddee"
            pki_keys = []

            [graph]
            directory = "graphs"
            default_authentication_graph_id = "login"
            "#,
        );
        let config = CastellanConfig::load(file.path()).unwrap();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.token.issuer, "https://idp.example");
        assert_eq!(config.graph.default_authentication_graph_id, "login");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = CastellanConfig::load(std::path::Path::new("/nonexistent/castellan.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn env_override_replaces_http_port() {
        let file = write_temp_config(
            r#"
            [token]
            issuer = "https://idp.example"

            [crypto]
            encryption_key_hex = "00112233445566778899aabbccddeeff00112233445566778899aabbccddee"
            pki_keys = []

            [graph]
            directory = "graphs"
            default_authentication_graph_id = "login"
            "#,
        );
        std::env::set_var("CASTELLAN__HTTP__PORT", "9999");
        let config = CastellanConfig::load(file.path()).unwrap();
        std::env::remove_var("CASTELLAN__HTTP__PORT");
        assert_eq!(config.http.port, 9999);
    }
}
