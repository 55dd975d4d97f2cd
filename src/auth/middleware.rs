use actix_web::HttpRequest;

use super::jwt::{validate_token, ACCESS_TOKEN};
use super::model::Claims;
use crate::config::JwtConfig;
use crate::error::ServiceError;
use crate::AppState;

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    pub id: String,
    pub email: String,
    pub permissions: Vec<String>,
}

impl AgentIdentity {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    pub fn require(&self, permission: &str) -> Result<(), ServiceError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "Missing permission '{}'",
                permission
            )))
        }
    }
}

/// Extract token from Authorization header
fn extract_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// Validate the bearer token of a request and return its access claims
pub fn validate_request_token(req: &HttpRequest, config: &JwtConfig) -> Result<Claims, ServiceError> {
    let token = extract_token(req)
        .ok_or_else(|| ServiceError::Unauthorized("Missing authorization token".to_string()))?;

    let claims = validate_token(config, &token).map_err(|e| {
        log::warn!("Token validation failed: {:?}", e);
        ServiceError::Unauthorized("Invalid or expired token".to_string())
    })?;

    if claims.token_type != ACCESS_TOKEN {
        return Err(ServiceError::Unauthorized("Invalid token type".to_string()));
    }

    Ok(claims)
}

/// Validate the token and load the agent behind it.
///
/// Permissions come from the stored agent, so a deactivation or permission
/// change applies to tokens already issued.
pub async fn authenticate(req: &HttpRequest, state: &AppState) -> Result<AgentIdentity, ServiceError> {
    let claims = validate_request_token(req, &state.config.jwt)?;

    let agent = state
        .find_agent(&claims.sub)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("Agent no longer exists".to_string()))?;

    if !agent.is_active {
        return Err(ServiceError::Unauthorized("Agent account is inactive".to_string()));
    }

    Ok(AgentIdentity {
        id: agent.id,
        email: agent.email,
        permissions: agent.permissions,
    })
}
