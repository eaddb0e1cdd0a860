use anyhow::Context;
use serde::Deserialize;

const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingConfig {
    pub api_key: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    pub geocoding: GeocodingConfig,
    /// Refuse logins until the account's email address is verified.
    pub require_verified_email: bool,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is required")?,
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
        };

        let username = env_or("SMTP_USER", "");
        let smtp = SmtpConfig {
            host: env_or("SMTP_HOST", "localhost"),
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(587),
            password: env_or("SMTP_PASS", ""),
            from: std::env::var("SMTP_FROM").unwrap_or_else(|_| username.clone()),
            username,
        };

        let geocoding = GeocodingConfig {
            api_key: env_or("GOOGLE_MAPS_API_KEY", ""),
            endpoint: env_or("GEOCODE_URL", GOOGLE_GEOCODE_URL),
        };

        Ok(Self {
            database_url,
            jwt,
            smtp,
            geocoding,
            require_verified_email: env_flag("REQUIRE_VERIFIED_EMAIL"),
        })
    }
}
