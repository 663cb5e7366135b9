use crate::auth::jwt::JwtConfig;

/// Default number of applications committed per housing batch transaction.
const DEFAULT_HOUSING_BATCH_CHUNK_SIZE: usize = 100;

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields except the database URL and JWT secret have defaults suitable
/// for local development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3001`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for background tasks, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// PostgreSQL connection string.
    pub database_url: String,
    /// JWT token configuration (secret, expiry durations).
    pub jwt: JwtConfig,
    /// Secret mixed into meal ticket QR payloads.
    pub ticket_qr_secret: String,
    /// Applications committed per transaction during campaign processing.
    pub housing_batch_chunk_size: usize,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                  |
    /// |----------------------------|--------------------------|
    /// | `HOST`                     | `0.0.0.0`                |
    /// | `PORT`                     | `3001`                   |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                     |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                     |
    /// | `DATABASE_URL`             | required                 |
    /// | `TICKET_QR_SECRET`         | the JWT secret           |
    /// | `HOUSING_BATCH_CHUNK_SIZE` | `100`                    |
    /// | `LOG_FORMAT`               | `text` (`json` accepted) |
    ///
    /// # Panics
    ///
    /// Panics on a missing `DATABASE_URL` or an unparsable value, so
    /// misconfiguration stops the process at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3001".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt = JwtConfig::from_env();

        let ticket_qr_secret = std::env::var("TICKET_QR_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| jwt.secret.clone());

        let housing_batch_chunk_size: usize = std::env::var("HOUSING_BATCH_CHUNK_SIZE")
            .unwrap_or_else(|_| DEFAULT_HOUSING_BATCH_CHUNK_SIZE.to_string())
            .parse()
            .expect("HOUSING_BATCH_CHUNK_SIZE must be a valid usize");
        assert!(
            housing_batch_chunk_size > 0,
            "HOUSING_BATCH_CHUNK_SIZE must be at least 1"
        );

        let log_format = LogFormat::parse(
            &std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
        );

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            database_url,
            jwt,
            ticket_qr_secret,
            housing_batch_chunk_size,
            log_format,
        }
    }
}
