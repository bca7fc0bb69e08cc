use std::env;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_SESSION_TTL_HOURS: i64 = 12;

/// Process configuration, read once at startup. Everything downstream takes
/// this by value or through `AppState`; nothing re-reads the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Public root the frontend is served from; verification URLs embedded in
    /// QR codes are built against it.
    pub site_url: String,
    pub admin_password: String,
    pub cors_allowed_origins: Vec<String>,
    pub session_ttl_hours: i64,
    pub hsts_enabled: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/gatepass".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            site_url: env::var("SITE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            admin_password: env::var("ADMIN_PASSWORD").expect("ADMIN_PASSWORD must be set"),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            session_ttl_hours: env::var("SESSION_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SESSION_TTL_HOURS),
            hsts_enabled: env::var("RUST_ENV")
                .map(|v| v.to_lowercase() == "production")
                .unwrap_or(false),
        }
    }
}
