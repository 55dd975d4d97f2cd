//! Environment-driven configuration.
//!
//! Everything is read once at startup (after `.env` is loaded) and handed to
//! the components that need it through [`crate::AppState`].

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/agency.db";
const DEFAULT_JWT_SECRET: &str = "agency-quote-server-secret-change-in-production";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";
const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Token signing settings.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_token_ttl: Duration::from_secs(60 * 60),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Where templates live, where output goes, and how PDFs are produced.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub template_dir: PathBuf,
    pub output_dir: PathBuf,
    pub primary_converter: String,
    pub fallback_converter: String,
    pub convert_timeout: Option<Duration>,
    pub template_cache_ttl: Duration,
}

impl RenderConfig {
    pub fn new(template_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
            output_dir: output_dir.into(),
            primary_converter: "docx2pdf".to_string(),
            fallback_converter: "libreoffice".to_string(),
            convert_timeout: None,
            template_cache_ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub jwt: JwtConfig,
    /// bcrypt work factor for new password hashes.
    pub bcrypt_cost: u32,
    pub render: RenderConfig,
}

impl AppConfig {
    /// Defaults for everything except the paths; nothing is read from the
    /// environment.
    pub fn new(database_url: impl Into<String>, render: RenderConfig) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
            jwt: JwtConfig::new(DEFAULT_JWT_SECRET),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            render,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let secret = match env::var("JWT_SECRET").or_else(|_| env::var("SECRET_KEY")) {
            Ok(secret) => secret,
            Err(_) => {
                log::warn!("JWT_SECRET not set, using default secret. SET THIS IN PRODUCTION!");
                DEFAULT_JWT_SECRET.to_string()
            }
        };

        let mut jwt = JwtConfig::new(secret);
        if let Some(minutes) = parse_var::<u64>("ACCESS_TOKEN_EXPIRE_MINUTES")? {
            jwt.access_token_ttl = token_ttl("ACCESS_TOKEN_EXPIRE_MINUTES", minutes, 60)?;
        }
        if let Some(days) = parse_var::<u64>("REFRESH_TOKEN_EXPIRE_DAYS")? {
            jwt.refresh_token_ttl = token_ttl("REFRESH_TOKEN_EXPIRE_DAYS", days, 24 * 60 * 60)?;
        }

        let mut render = RenderConfig::new(
            env::var("TEMPLATE_DIR")
                .or_else(|_| env::var("TEMPLATES_DIR"))
                .unwrap_or_else(|_| "templates".to_string()),
            env::var("OUTPUT_DIR").unwrap_or_else(|_| "output".to_string()),
        );
        if let Ok(program) = env::var("PDF_PRIMARY_CONVERTER") {
            render.primary_converter = program;
        }
        if let Ok(program) = env::var("PDF_FALLBACK_CONVERTER") {
            render.fallback_converter = program;
        }
        render.convert_timeout = parse_var::<u64>("PDF_CONVERT_TIMEOUT_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        if let Some(secs) = parse_var::<u64>("TEMPLATE_CACHE_TTL_SECS")? {
            render.template_cache_ttl = Duration::from_secs(secs);
        }

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| {
            log::info!("DATABASE_URL not set, using default: {}", DEFAULT_DATABASE_URL);
            DEFAULT_DATABASE_URL.to_string()
        });

        let cors_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        let bcrypt_cost = parse_var::<u32>("BCRYPT_COST")?.unwrap_or(bcrypt::DEFAULT_COST);
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                name: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
                reason: "must be between 4 and 31".to_string(),
            });
        }

        Ok(Self {
            database_url,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var::<u16>("PORT")?.unwrap_or(8080),
            cors_origins,
            jwt,
            bcrypt_cost,
            render,
        })
    }
}

/// `count` units of `unit_secs` each, capped at ten years.
fn token_ttl(name: &'static str, count: u64, unit_secs: u64) -> Result<Duration, ConfigError> {
    count
        .checked_mul(unit_secs)
        .filter(|secs| *secs <= MAX_TOKEN_TTL_SECS)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Invalid {
            name,
            value: count.to_string(),
            reason: "token lifetime must not exceed ten years".to_string(),
        })
}

fn parse_var<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                name,
                value,
                reason: e.to_string(),
            }),
        _ => Ok(None),
    }
}
