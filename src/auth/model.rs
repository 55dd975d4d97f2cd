use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const PERMISSION_QUOTE_READ: &str = "quote:read";
pub const PERMISSION_QUOTE_WRITE: &str = "quote:write";
pub const PERMISSION_AGENT_ADMIN: &str = "agent:admin";

pub fn default_permissions() -> Vec<String> {
    vec![
        PERMISSION_QUOTE_READ.to_string(),
        PERMISSION_QUOTE_WRITE.to_string(),
    ]
}

/// Agent stored in the `agents` collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Agent info for API responses (without sensitive data)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AgentInfo {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub is_active: bool,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<Agent> for AgentInfo {
    fn from(agent: Agent) -> Self {
        Self {
            id: agent.id,
            email: agent.email,
            full_name: agent.full_name,
            is_active: agent.is_active,
            permissions: agent.permissions,
            created_at: agent.created_at,
            last_login: agent.last_login,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
}

/// JSON login payload
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// OAuth2 password-flow form (`username` carries the email)
#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // agent id
    pub email: String,
    pub permissions: Vec<String>,
    pub exp: usize,
    pub iat: usize,
    pub token_type: String, // "access" or "refresh"
}
