use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use super::model::{Agent, Claims};
use crate::config::JwtConfig;

pub const ACCESS_TOKEN: &str = "access";
pub const REFRESH_TOKEN: &str = "refresh";

fn issue(
    config: &JwtConfig,
    agent: &Agent,
    token_type: &str,
    ttl_seconds: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: agent.id.clone(),
        email: agent.email.clone(),
        permissions: agent.permissions.clone(),
        exp: now + ttl_seconds as usize,
        iat: now,
        token_type: token_type.to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Generate access token (short-lived)
pub fn generate_access_token(
    config: &JwtConfig,
    agent: &Agent,
) -> Result<String, jsonwebtoken::errors::Error> {
    issue(config, agent, ACCESS_TOKEN, config.access_token_ttl.as_secs())
}

/// Generate refresh token (long-lived)
pub fn generate_refresh_token(
    config: &JwtConfig,
    agent: &Agent,
) -> Result<String, jsonwebtoken::errors::Error> {
    issue(config, agent, REFRESH_TOKEN, config.refresh_token_ttl.as_secs())
}

/// Validate and decode a token
pub fn validate_token(config: &JwtConfig, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Access token lifetime in seconds
pub fn access_token_expiry(config: &JwtConfig) -> i64 {
    config.access_token_ttl.as_secs() as i64
}
