use secrecy::SecretString;
use std::net::SocketAddr;
use std::time::Duration;

/// Main configuration for a pointe deployment.
///
/// Built from `POINTE_*` environment variables with sensible defaults;
/// nothing here is required for tests, which construct components
/// directly.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub checkout: CheckoutConfig,
    pub billing: BillingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Connection settings for the external card-payment gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway API.
    pub base_url: String,
    /// API key; redacted in debug output.
    pub api_key: SecretString,
    /// Request timeout for gateway calls. Timeouts surface as network
    /// errors; retry policy belongs to the calling business operation.
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Lifetime of pending-checkout metadata, matching the gateway's own
    /// hosted-session lifetime.
    pub session_ttl_seconds: u64,
    /// Public base URL the gateway calls back to (success and failure
    /// callbacks are derived from it).
    pub callback_base_url: String,
}

#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Days since the last payment before a subscription is due.
    /// The dry-run/force toggles are per-invocation and live on
    /// [`crate::billing::RunOptions`].
    pub charge_after_days: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gateway.example.com/api".to_string(),
            api_key: SecretString::from(String::new()),
            timeout_seconds: 5,
        }
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: 3600,
            callback_base_url: "https://localhost:8000".to_string(),
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            charge_after_days: 30,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            gateway: GatewayConfig::default(),
            checkout: CheckoutConfig::default(),
            billing: BillingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `POINTE_*` environment variables, falling
    /// back to defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Self {
            server: ServerConfig {
                host: env_or("POINTE_HOST", defaults.server.host),
                port: env_parse_or("POINTE_PORT", defaults.server.port),
            },
            gateway: GatewayConfig {
                base_url: env_or("POINTE_GATEWAY_URL", defaults.gateway.base_url),
                api_key: SecretString::from(env_or("POINTE_GATEWAY_API_KEY", String::new())),
                timeout_seconds: env_parse_or(
                    "POINTE_GATEWAY_TIMEOUT_SECONDS",
                    defaults.gateway.timeout_seconds,
                ),
            },
            checkout: CheckoutConfig {
                session_ttl_seconds: env_parse_or(
                    "POINTE_CHECKOUT_TTL_SECONDS",
                    defaults.checkout.session_ttl_seconds,
                ),
                callback_base_url: env_or(
                    "POINTE_CALLBACK_BASE_URL",
                    defaults.checkout.callback_base_url,
                ),
            },
            billing: BillingConfig {
                charge_after_days: env_parse_or(
                    "POINTE_CHARGE_AFTER_DAYS",
                    defaults.billing.charge_after_days,
                ),
            },
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl CheckoutConfig {
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }
}

impl GatewayConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.checkout.session_ttl_seconds, 3600);
        assert_eq!(config.billing.charge_after_days, 30);
        assert_eq!(config.gateway.timeout_seconds, 5);
    }

    #[test]
    fn server_addr_parses() {
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 9000,
        };
        assert_eq!(server.addr().unwrap().port(), 9000);
    }
}
