use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

const DEV_JWT_SECRET: &str = "your_jwt_secret_key";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub auth: AuthConfig,
    pub store: StoreConfig,
    pub reports: ReportsConfig,
    pub tracking: TrackingConfig,
    pub keepalive: KeepAliveConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .or_else(|_| env::var("PORT"))
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if environment.is_production() => return Err(ConfigError::MissingJwtSecret),
            _ => DEV_JWT_SECRET.to_string(),
        };
        let token_ttl_hours = parse_number("TOKEN_TTL_HOURS", 24)?;
        let bcrypt_cost = parse_number("BCRYPT_COST", 10)?;

        let service_account = env::var("FIREBASE_SERVICE_ACCOUNT")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let service_account_path = PathBuf::from(
            env::var("FIREBASE_SERVICE_ACCOUNT_PATH")
                .unwrap_or_else(|_| "serviceAccountKey.json".to_string()),
        );

        let output_dir =
            PathBuf::from(env::var("REPORTS_DIR").unwrap_or_else(|_| "reports".to_string()));

        let capture_minutes: u64 = parse_number("TRACKING_INTERVAL_MINUTES", 60)?;
        let retry_seconds: u64 = parse_number("TRACKING_RETRY_SECONDS", 30)?;
        if capture_minutes == 0 {
            return Err(ConfigError::InvalidNumber {
                key: "TRACKING_INTERVAL_MINUTES",
            });
        }

        let target_url = env::var("KEEPALIVE_TARGET_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        let ping_minutes: u64 = parse_number("KEEPALIVE_INTERVAL_MINUTES", 10)?;
        let keepalive_port: u16 = parse_number("KEEPALIVE_PORT", 3001)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            auth: AuthConfig {
                jwt_secret,
                token_ttl_hours,
                bcrypt_cost,
            },
            store: StoreConfig {
                service_account,
                service_account_path,
            },
            reports: ReportsConfig { output_dir },
            tracking: TrackingConfig {
                capture_interval: Duration::from_secs(capture_minutes * 60),
                initial_backoff: Duration::from_secs(retry_seconds),
            },
            keepalive: KeepAliveConfig {
                target_url,
                interval: Duration::from_secs(ping_minutes.max(1) * 60),
                port: keepalive_port,
            },
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Token signing and password hashing.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

/// Where the document store credentials come from. Neither source being usable means demo data.
#[derive(Clone)]
pub struct StoreConfig {
    pub service_account: Option<String>,
    pub service_account_path: PathBuf,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("service_account", &self.service_account.as_ref().map(|_| "<inline>"))
            .field("service_account_path", &self.service_account_path)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ReportsConfig {
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TrackingConfig {
    pub capture_interval: Duration,
    pub initial_backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct KeepAliveConfig {
    pub target_url: String,
    pub interval: Duration,
    pub port: u16,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    MissingJwtSecret,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a positive number")
            }
            ConfigError::MissingJwtSecret => {
                write!(f, "JWT_SECRET must be set when APP_ENV is production")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::MissingJwtSecret => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "PORT",
            "APP_LOG_LEVEL",
            "JWT_SECRET",
            "TOKEN_TTL_HOURS",
            "BCRYPT_COST",
            "FIREBASE_SERVICE_ACCOUNT",
            "FIREBASE_SERVICE_ACCOUNT_PATH",
            "REPORTS_DIR",
            "TRACKING_INTERVAL_MINUTES",
            "TRACKING_RETRY_SECONDS",
            "KEEPALIVE_TARGET_URL",
            "KEEPALIVE_INTERVAL_MINUTES",
            "KEEPALIVE_PORT",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.auth.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert_eq!(config.tracking.capture_interval, Duration::from_secs(3600));
        assert_eq!(config.keepalive.interval, Duration::from_secs(600));
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn falls_back_to_platform_port() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PORT", "8080");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn production_requires_jwt_secret() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        let err = AppConfig::load().expect_err("secret is mandatory");
        assert!(matches!(err, ConfigError::MissingJwtSecret));

        env::set_var("JWT_SECRET", "rotated-secret");
        let config = AppConfig::load().expect("config loads with secret");
        assert_eq!(config.auth.jwt_secret, "rotated-secret");
    }

    #[test]
    fn rejects_zero_capture_interval() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("TRACKING_INTERVAL_MINUTES", "0");
        let err = AppConfig::load().expect_err("zero interval rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                key: "TRACKING_INTERVAL_MINUTES"
            }
        ));
    }
}
