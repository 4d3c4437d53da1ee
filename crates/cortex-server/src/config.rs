//! Process configuration, read from the environment.
//!
//! Missing required values fail startup with exit code 1. Unknown
//! feature flags are preserved verbatim so newer deployments can ship
//! flags this build does not know about.

use std::collections::BTreeMap;

use cortex_db::DbConfig;
use thiserror::Error;
use uuid::Uuid;

const FLAG_PREFIX: &str = "CORTEX_FLAG_";
const PROVIDER_KEY_PREFIX: &str = "CORTEX_PROVIDER_KEY_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    MissingRequired(String),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub environment: Environment,
    pub db: DbConfig,
    /// Server-side secret peppered into password hashes and used to
    /// protect token material at rest.
    pub token_secret: String,
    /// Tenant assumed when `X-Tenant` is absent. Only meaningful in
    /// single-tenant deployments.
    pub default_tenant: Option<Uuid>,
    pub session_ttl_secs: u64,
    /// Credentials per provider id, for provider implementations that
    /// need them.
    pub provider_keys: BTreeMap<String, String>,
    pub feature_flags: BTreeMap<String, bool>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Build from an explicit variable set. Factored out of
    /// [`Config::from_env`] for tests.
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self, ConfigError> {
        let vars: BTreeMap<String, String> = vars.into_iter().collect();

        let required = |key: &str| -> Result<String, ConfigError> {
            vars.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| ConfigError::MissingRequired(key.to_string()))
        };
        let optional = |key: &str, default: &str| -> String {
            vars.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        let environment = match optional("CORTEX_ENV", "production").as_str() {
            "development" => Environment::Development,
            "production" => Environment::Production,
            other => {
                return Err(ConfigError::Invalid {
                    key: "CORTEX_ENV".into(),
                    message: format!("expected development or production, got {other}"),
                });
            }
        };

        let default_tenant = match vars.get("CORTEX_DEFAULT_TENANT").filter(|v| !v.is_empty()) {
            Some(raw) => Some(Uuid::parse_str(raw).map_err(|e| ConfigError::Invalid {
                key: "CORTEX_DEFAULT_TENANT".into(),
                message: e.to_string(),
            })?),
            None => None,
        };

        let session_ttl_secs = optional("CORTEX_SESSION_TTL_SECS", "7200")
            .parse()
            .map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                key: "CORTEX_SESSION_TTL_SECS".into(),
                message: e.to_string(),
            })?;

        // Unknown flag names are carried through untouched.
        let mut feature_flags = BTreeMap::new();
        let mut provider_keys = BTreeMap::new();
        for (key, value) in &vars {
            if let Some(flag) = key.strip_prefix(FLAG_PREFIX) {
                let enabled = matches!(value.as_str(), "1" | "true" | "yes" | "on");
                feature_flags.insert(flag.to_lowercase(), enabled);
            } else if let Some(provider) = key.strip_prefix(PROVIDER_KEY_PREFIX) {
                provider_keys.insert(provider.to_lowercase(), value.clone());
            }
        }

        Ok(Self {
            bind_addr: optional("CORTEX_BIND", "0.0.0.0:8080"),
            environment,
            db: DbConfig {
                url: required("CORTEX_DB_URL")?,
                namespace: optional("CORTEX_DB_NAMESPACE", "cortex"),
                database: optional("CORTEX_DB_NAME", "main"),
                username: optional("CORTEX_DB_USER", "root"),
                password: optional("CORTEX_DB_PASS", "root"),
            },
            token_secret: required("CORTEX_TOKEN_SECRET")?,
            default_tenant,
            session_ttl_secs,
            provider_keys,
            feature_flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> Vec<(String, String)> {
        vec![
            ("CORTEX_DB_URL".into(), "127.0.0.1:8000".into()),
            ("CORTEX_TOKEN_SECRET".into(), "s3cret".into()),
        ]
    }

    #[test]
    fn minimal_config_loads() {
        let config = Config::from_vars(base_vars()).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.db.namespace, "cortex");
    }

    #[test]
    fn missing_required_value_fails() {
        let err = Config::from_vars(vec![(
            "CORTEX_TOKEN_SECRET".to_string(),
            "s3cret".to_string(),
        )])
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(key) if key == "CORTEX_DB_URL"));
    }

    #[test]
    fn unknown_flags_are_preserved() {
        let mut vars = base_vars();
        vars.push(("CORTEX_FLAG_SHINY_NEW_THING".into(), "true".into()));
        vars.push(("CORTEX_FLAG_LEGACY_MODE".into(), "0".into()));
        let config = Config::from_vars(vars).unwrap();
        assert_eq!(config.feature_flags.get("shiny_new_thing"), Some(&true));
        assert_eq!(config.feature_flags.get("legacy_mode"), Some(&false));
    }

    #[test]
    fn invalid_environment_fails() {
        let mut vars = base_vars();
        vars.push(("CORTEX_ENV".into(), "staging".into()));
        assert!(Config::from_vars(vars).is_err());
    }

    #[test]
    fn provider_keys_are_collected() {
        let mut vars = base_vars();
        vars.push(("CORTEX_PROVIDER_KEY_CANNED".into(), "key-123".into()));
        let config = Config::from_vars(vars).unwrap();
        assert_eq!(config.provider_keys.get("canned").map(String::as_str), Some("key-123"));
    }
}
