//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Static metadata about the event being registered for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    pub name: String,
    /// Human-readable date shown on every screen.
    pub display_date: String,
    /// ISO date stored on each registration.
    pub date: String,
    pub time: String,
    /// Short venue line used in summaries.
    pub venue: String,
    /// Street address for the information screen.
    pub venue_address: String,
}

impl Default for EventInfo {
    fn default() -> Self {
        Self {
            name: "Kenya Islamic Education Fair".to_string(),
            display_date: "September 14th, 2024".to_string(),
            date: "2024-09-14".to_string(),
            time: "9:00 AM - 2:00 PM".to_string(),
            venue: "Kenya Muslim Academy, Nairobi".to_string(),
            venue_address: "Park Road, Nairobi".to_string(),
        }
    }
}

/// Dialog engine configuration.
#[derive(Debug, Clone)]
pub struct UssdConfig {
    /// Sessions older than this are removed by the sweeper.
    pub session_timeout: Duration,
    /// Invalid inputs allowed before the dialog is terminated.
    pub max_attempts: u32,
    /// How often the sweeper runs.
    pub sweep_interval: Duration,
    /// Short code users dial, shown on exit screens.
    pub ussd_code: String,
    /// Phone number printed on help and error screens.
    pub helpline: String,
    /// Prefix for generated registration ids.
    pub registration_prefix: String,
    pub event: EventInfo,
}

impl Default for UssdConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_millis(300_000), // 5 minutes
            max_attempts: 3,
            sweep_interval: Duration::from_millis(300_000), // 5 minutes
            ussd_code: "*386*55#".to_string(),
            helpline: "0731838387".to_string(),
            registration_prefix: "KEF".to_string(),
            event: EventInfo::default(),
        }
    }
}

impl UssdConfig {
    /// Build from `USSD_*` environment variables, keeping defaults for
    /// anything absent or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let session_timeout = env_parse::<u64>("USSD_SESSION_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.session_timeout);
        let sweep_interval = env_parse::<u64>("USSD_SWEEP_INTERVAL_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.sweep_interval);
        let max_attempts = env_parse::<u32>("USSD_MAX_ATTEMPTS").unwrap_or(defaults.max_attempts);

        Self {
            session_timeout,
            max_attempts,
            sweep_interval,
            ussd_code: std::env::var("USSD_CODE").unwrap_or(defaults.ussd_code),
            helpline: std::env::var("USSD_HELPLINE").unwrap_or(defaults.helpline),
            registration_prefix: std::env::var("USSD_REGISTRATION_PREFIX")
                .unwrap_or(defaults.registration_prefix),
            event: defaults.event,
        }
        .normalized()
    }

    /// Clamp values that would make the dialog unusable.
    pub fn normalized(mut self) -> Self {
        if self.max_attempts == 0 {
            tracing::warn!("USSD max_attempts of 0 is not usable; using 1");
            self.max_attempts = 1;
        }
        let defaults = Self::default();
        if self.session_timeout.is_zero() {
            tracing::warn!(
                "USSD session_timeout of 0 is not usable; using {}ms",
                defaults.session_timeout.as_millis()
            );
            self.session_timeout = defaults.session_timeout;
        }
        if self.sweep_interval.is_zero() {
            tracing::warn!(
                "USSD sweep_interval of 0 is not usable; using {}ms",
                defaults.sweep_interval.as_millis()
            );
            self.sweep_interval = defaults.sweep_interval;
        }
        self
    }
}

/// HTTP server and process settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
    /// Directory for a daily rolling log file; stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            db_path: PathBuf::from("./data/registrations.db"),
            log_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            db_path: std::env::var("USSD_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            log_dir: std::env::var("USSD_LOG_DIR").ok().map(PathBuf::from),
        }
    }
}

/// Default Africa's Talking bulk SMS endpoint.
pub const DEFAULT_SMS_URL: &str = "https://api.africastalking.com/version1/messaging";

/// SMS gateway credentials.
#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub api_key: SecretString,
    pub username: String,
    pub sender_id: Option<String>,
    pub url: String,
}

impl SmsConfig {
    /// Returns `Ok(None)` when `AT_API_KEY` is not set (SMS disabled).
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(api_key) = lookup("AT_API_KEY") else {
            return Ok(None);
        };
        if api_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "AT_API_KEY".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let url = lookup("AT_SMS_URL").unwrap_or_else(|| DEFAULT_SMS_URL.to_string());
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::InvalidValue {
                key: "AT_SMS_URL".to_string(),
                message: format!("not an http(s) URL: {url}"),
            });
        }

        Ok(Some(Self {
            api_key: SecretString::from(api_key),
            username: lookup("AT_USERNAME").unwrap_or_else(|| "sandbox".to_string()),
            sender_id: lookup("AT_SENDER_ID").filter(|s| !s.trim().is_empty()),
            url,
        }))
    }
}

/// Read and parse an environment variable, warning when it is set but
/// unparsable.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}
