//! Environment configuration
//!
//! Reads the service configuration from environment variables (after
//! `dotenvy` has loaded `.env`). Missing required values are reported as
//! `ConfigError` instead of panicking.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(String),

    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: String, value: String },
}

/// Payment gateway credentials and transport settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub key_id: String,
    pub key_secret: String,
    pub timeout: Duration,
}

/// Booking engine policy knobs
#[derive(Debug, Clone)]
pub struct BookingPolicyConfig {
    pub currency: String,
    /// How long an unpaid pending booking keeps blocking its window
    pub pending_grace: chrono::Duration,
    /// Pending bookings older than this are cancelled by the reaper
    pub pending_ttl: Option<chrono::Duration>,
    pub reaper_interval: Duration,
    pub enforce_server_pricing: bool,
}

impl Default for BookingPolicyConfig {
    fn default() -> Self {
        Self {
            currency: "INR".to_string(),
            pending_grace: chrono::Duration::seconds(120),
            pending_ttl: None,
            reaper_interval: Duration::from_secs(60),
            enforce_server_pricing: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub log_level: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub cors_origins: Vec<String>,
    pub redis_url: Option<String>,
    pub idempotency_ttl: u64,
    pub gateway: GatewayConfig,
    pub booking: BookingPolicyConfig,
}

impl EnvironmentConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = BookingPolicyConfig::default();

        let pending_ttl = optional::<i64>("BOOKING_PENDING_TTL_MINS")?
            .filter(|mins| *mins > 0)
            .map(chrono::Duration::minutes);

        Ok(Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            port: parsed_or("PORT", 3000)?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_expiration: parsed_or("JWT_EXPIRATION", 86_400)?,
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty()),
            idempotency_ttl: parsed_or("IDEMPOTENCY_TTL_SECS", 86_400)?,
            gateway: GatewayConfig {
                base_url: env::var("RAZORPAY_BASE_URL")
                    .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string()),
                key_id: required("RAZORPAY_KEY_ID")?,
                key_secret: required("RAZORPAY_KEY_SECRET")?,
                timeout: Duration::from_secs(parsed_or("GATEWAY_TIMEOUT_SECS", 15)?),
            },
            booking: BookingPolicyConfig {
                currency: env::var("BOOKING_CURRENCY").unwrap_or(defaults.currency),
                pending_grace: chrono::Duration::seconds(parsed_or(
                    "BOOKING_PENDING_GRACE_SECS",
                    defaults.pending_grace.num_seconds(),
                )?),
                pending_ttl,
                reaper_interval: Duration::from_secs(parsed_or("BOOKING_REAPER_INTERVAL_SECS", 60)?),
                enforce_server_pricing: parsed_or("BOOKING_ENFORCE_SERVER_PRICING", false)?,
            },
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required(key: &str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::Missing(key.to_string()))
}

fn optional<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value: raw,
            }),
        _ => Ok(None),
    }
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    Ok(optional(key)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_policy_defaults() {
        let policy = BookingPolicyConfig::default();
        assert_eq!(policy.currency, "INR");
        assert_eq!(policy.pending_grace, chrono::Duration::minutes(2));
        assert!(policy.pending_ttl.is_none());
        assert!(!policy.enforce_server_pricing);
    }

    #[test]
    fn test_optional_rejects_unparsable_value() {
        env::set_var("RENTAL_TEST_BAD_NUMBER", "abc");
        let result = optional::<u64>("RENTAL_TEST_BAD_NUMBER");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
        env::remove_var("RENTAL_TEST_BAD_NUMBER");
    }

    #[test]
    fn test_required_reports_missing_key() {
        let result = required("RENTAL_TEST_SURELY_UNSET");
        assert!(matches!(result, Err(ConfigError::Missing(key)) if key == "RENTAL_TEST_SURELY_UNSET"));
    }
}
