//! Configuration types.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default generative model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// How inbound updates reach the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Telegram pushes each update to the HTTP endpoint.
    Webhook,
    /// The bot long-polls `getUpdates` (local development).
    Polling,
}

impl std::str::FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webhook" => Ok(Self::Webhook),
            "polling" | "poll" => Ok(Self::Polling),
            other => Err(format!("unknown mode '{other}' (expected webhook or polling)")),
        }
    }
}

/// Relay (SMTP submission) endpoint shared by every identity.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
        }
    }
}

/// Bot configuration, built once per process.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_token: SecretString,
    pub gemini_api_key: SecretString,
    pub model: String,
    /// The single privileged actor.
    pub admin_id: String,
    pub db_path: String,
    pub relay: RelayConfig,
    pub port: u16,
    pub mode: RunMode,
    /// Replace the dispatch status message after every N identities.
    pub progress_every: usize,
}

impl BotConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let telegram_token = SecretString::from(required("TELEGRAM_BOT_TOKEN")?);
        let gemini_api_key = SecretString::from(required("GEMINI_API_KEY")?);
        let admin_id = required("ADMIN_ID")?;

        let model = lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let db_path =
            lookup("BOT_DB_PATH").unwrap_or_else(|| "./data/takedown-bot.db".to_string());

        let defaults = RelayConfig::default();
        let relay = RelayConfig {
            host: lookup("SMTP_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "SMTP_PORT", defaults.port)?,
        };

        let port = parse_or(&lookup, "BOT_PORT", 8080u16)?;

        let mode = match lookup("BOT_MODE") {
            Some(raw) => raw.parse().map_err(|message| ConfigError::InvalidValue {
                key: "BOT_MODE".to_string(),
                message,
            })?,
            None => RunMode::Webhook,
        };

        let progress_every = parse_or(&lookup, "DISPATCH_PROGRESS_EVERY", 2usize)?;
        if progress_every == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DISPATCH_PROGRESS_EVERY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            telegram_token,
            gemini_api_key,
            model,
            admin_id,
            db_path,
            relay,
            port,
            mode,
            progress_every,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("TELEGRAM_BOT_TOKEN", "123:ABC"),
        ("GEMINI_API_KEY", "gem-key"),
        ("ADMIN_ID", "42"),
    ];

    #[test]
    fn defaults_applied() {
        let config = BotConfig::from_lookup(env(REQUIRED)).unwrap();
        assert_eq!(config.telegram_token.expose_secret(), "123:ABC");
        assert_eq!(config.admin_id, "42");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.relay.host, "smtp.gmail.com");
        assert_eq!(config.relay.port, 587);
        assert_eq!(config.port, 8080);
        assert_eq!(config.mode, RunMode::Webhook);
        assert_eq!(config.progress_every, 2);
    }

    #[test]
    fn missing_admin_is_an_error() {
        let err = BotConfig::from_lookup(env(&REQUIRED[..2])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "ADMIN_ID"));
    }

    #[test]
    fn blank_required_value_is_missing() {
        let mut pairs = REQUIRED.to_vec();
        pairs[1] = ("GEMINI_API_KEY", "   ");
        let err = BotConfig::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "GEMINI_API_KEY"));
    }

    #[test]
    fn invalid_port_reported() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SMTP_PORT", "not-a-port"));
        let err = BotConfig::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "SMTP_PORT"));
    }

    #[test]
    fn polling_mode_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("BOT_MODE", "Polling"));
        let config = BotConfig::from_lookup(env(&pairs)).unwrap();
        assert_eq!(config.mode, RunMode::Polling);
    }

    #[test]
    fn zero_progress_cadence_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DISPATCH_PROGRESS_EVERY", "0"));
        assert!(BotConfig::from_lookup(env(&pairs)).is_err());
    }
}
