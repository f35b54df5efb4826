use crate::auth::{AuthPolicy, CredentialForwarding};
use crate::error::{RelayError, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;

/// Environment variable consulted for the bearer secret.
///
/// Takes precedence over any `auth.token` value in the config file so the
/// secret can be injected at deploy time instead of living in source or
/// checked-in configuration.
pub const TOKEN_ENV_VAR: &str = "RELAY_BEARER_TOKEN";

/// Main relay configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RelayConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upstream request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Value of the X-Proxied-By attribution header on relayed responses
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    /// Whether inbound requests must present the bearer credential
    #[serde(default)]
    pub policy: AuthPolicy,
    /// Bearer secret; the RELAY_BEARER_TOKEN environment variable wins
    #[serde(default)]
    pub token: Option<SecretString>,
    /// How caller credentials are carried to the upstream target
    #[serde(default)]
    pub forwarding: CredentialForwarding,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> u64 {
    30
}

fn default_instance_name() -> String {
    "relay".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout(),
            instance_name: default_instance_name(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from a YAML file, then apply environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RelayError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_yaml(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| RelayError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Build a configuration from defaults plus environment overrides
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Pull the bearer secret from the environment if set
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            self.auth.token = Some(SecretString::new(token));
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.auth.policy == AuthPolicy::RequireBearer && self.auth.token.is_none() {
            return Err(RelayError::Config(format!(
                "Auth policy requires a bearer token: set auth.token or {}",
                TOKEN_ENV_VAR
            )));
        }

        if self.server.timeout_secs == 0 {
            return Err(RelayError::Config(
                "Upstream timeout must be > 0 seconds".to_string(),
            ));
        }

        if self.server.instance_name.is_empty() {
            return Err(RelayError::Config(
                "Instance name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_parse_valid_config() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9090
  timeout_secs: 10
  instance_name: "relay-us-east"

auth:
  policy: require_bearer
  token: "s3cret"
  forwarding: override_header
"#;

        let config = RelayConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.timeout_secs, 10);
        assert_eq!(config.server.instance_name, "relay-us-east");
        assert_eq!(config.auth.policy, AuthPolicy::RequireBearer);
        assert_eq!(config.auth.token.unwrap().expose_secret(), "s3cret");
        assert_eq!(config.auth.forwarding, CredentialForwarding::OverrideHeader);
    }

    #[test]
    fn test_default_values() {
        let yaml = "server: {}\n";

        let config = RelayConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.timeout_secs, 30);
        assert_eq!(config.server.instance_name, "relay");
        assert_eq!(config.auth.policy, AuthPolicy::RequireBearer);
        assert!(config.auth.token.is_none());
    }

    #[test]
    fn test_validate_requires_token_for_bearer_policy() {
        let config = RelayConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_open_policy_without_token() {
        let config = RelayConfig::from_yaml("auth:\n  policy: open\n").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let yaml = r#"
server:
  timeout_secs: 0
auth:
  policy: open
"#;
        let config = RelayConfig::from_yaml(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_with_token() {
        let config = RelayConfig::from_yaml("auth:\n  token: \"s3cret\"\n").unwrap();
        assert!(config.validate().is_ok());
    }
}
