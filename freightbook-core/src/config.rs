use std::path::PathBuf;

use crate::error::{FreightError, Result};

pub const ENV_STORE: &str = "FREIGHTBOOK_STORE";
pub const ENV_SESSION_FILE: &str = "FREIGHTBOOK_SESSION_FILE";
pub const ENV_JWT_SECRET: &str = "FREIGHTBOOK_JWT_SECRET";
pub const ENV_TOKEN_TTL: &str = "FREIGHTBOOK_TOKEN_TTL_SECS";

const DEFAULT_STORE: &str = "freightbook.log";
const DEFAULT_SESSION_FILE: &str = ".freightbook-session";
const DEFAULT_TTL_SECS: u64 = 12 * 60 * 60;
const DEV_SECRET: &str = "freightbook-development-secret";

#[derive(Clone, Debug)]
pub struct TokenConfig {
    pub issuer: String,
    pub audience: String,
    pub secret: String,
    pub ttl_seconds: u64,
}

impl TokenConfig {
    pub fn with_secret(secret: &str) -> Self {
        Self {
            issuer: "freightbook".into(),
            audience: "freightbook-staff".into(),
            secret: secret.into(),
            ttl_seconds: DEFAULT_TTL_SECS,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub store_path: PathBuf,
    pub session_file: PathBuf,
    pub tokens: TokenConfig,
    /// True when no secret was configured and the built-in development one is used.
    pub dev_secret: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let store_path = value(ENV_STORE).unwrap_or_else(|| DEFAULT_STORE.into()).into();
        let session_file = value(ENV_SESSION_FILE)
            .unwrap_or_else(|| DEFAULT_SESSION_FILE.into())
            .into();

        let (secret, dev_secret) = match value(ENV_JWT_SECRET) {
            Some(s) if s.len() < 16 => {
                return Err(FreightError::Config(format!(
                    "{ENV_JWT_SECRET} must be at least 16 characters"
                )));
            }
            Some(s) => (s, false),
            None => (DEV_SECRET.to_string(), true),
        };

        let mut tokens = TokenConfig::with_secret(&secret);
        if let Some(raw) = value(ENV_TOKEN_TTL) {
            tokens.ttl_seconds = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    FreightError::Config(format!("{ENV_TOKEN_TTL} must be a positive integer, got `{raw}`"))
                })?;
        }

        Ok(Self {
            store_path,
            session_file,
            tokens,
            dev_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let c = config(&[]).unwrap();
        assert_eq!(c.store_path, PathBuf::from("freightbook.log"));
        assert!(c.dev_secret);
        assert_eq!(c.tokens.ttl_seconds, 12 * 60 * 60);
    }

    #[test]
    fn overrides_are_read() {
        let c = config(&[
            (ENV_STORE, "/var/lib/fb/store.log"),
            (ENV_JWT_SECRET, "0123456789abcdef0123"),
            (ENV_TOKEN_TTL, "600"),
        ])
        .unwrap();
        assert_eq!(c.store_path, PathBuf::from("/var/lib/fb/store.log"));
        assert!(!c.dev_secret);
        assert_eq!(c.tokens.ttl_seconds, 600);
    }

    #[test]
    fn bad_values_are_config_errors() {
        assert!(matches!(
            config(&[(ENV_TOKEN_TTL, "soon")]),
            Err(FreightError::Config(_))
        ));
        assert!(matches!(
            config(&[(ENV_TOKEN_TTL, "0")]),
            Err(FreightError::Config(_))
        ));
        assert!(matches!(
            config(&[(ENV_JWT_SECRET, "short")]),
            Err(FreightError::Config(_))
        ));
    }
}
