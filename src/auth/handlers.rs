use actix_web::{web, HttpRequest, HttpResponse};
use bcrypt::{hash, verify};

use super::jwt::{
    access_token_expiry, generate_access_token, generate_refresh_token, validate_token,
    REFRESH_TOKEN,
};
use super::middleware::authenticate;
use super::model::{
    Agent, AgentInfo, LoginRequest, RefreshRequest, RegisterRequest, SetActiveRequest, TokenForm,
    TokenResponse, PERMISSION_AGENT_ADMIN,
};
use crate::error::ServiceError;
use crate::validation::{validate_email, validate_min_length, validate_required, ValidationErrors};
use crate::AppState;

const MIN_PASSWORD_LENGTH: usize = 8;

fn token_error(e: jsonwebtoken::errors::Error) -> ServiceError {
    log::error!("Failed to generate token: {:?}", e);
    ServiceError::Internal("Failed to generate token".to_string())
}

fn issue_tokens(state: &AppState, agent: &Agent) -> Result<TokenResponse, ServiceError> {
    let jwt = &state.config.jwt;
    Ok(TokenResponse {
        access_token: generate_access_token(jwt, agent).map_err(token_error)?,
        refresh_token: generate_refresh_token(jwt, agent).map_err(token_error)?,
        token_type: "Bearer".to_string(),
        expires_in: access_token_expiry(jwt),
    })
}

/// Check credentials, stamp `last_login` and issue a token pair.
async fn login_with(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<TokenResponse, ServiceError> {
    let invalid = || ServiceError::Unauthorized("Invalid email or password".to_string());

    let agent = state.find_agent_by_email(email.trim()).await?.ok_or_else(invalid)?;

    let password_valid = verify(password, &agent.password_hash).unwrap_or(false);
    if !password_valid {
        log::warn!("Failed login for {}", agent.email);
        return Err(invalid());
    }
    if !agent.is_active {
        return Err(ServiceError::Unauthorized(
            "Agent account is inactive".to_string(),
        ));
    }

    let agent = state.record_login(&agent.id).await?;
    issue_tokens(state, &agent)
}

/// Register a new agent
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Agent created", body = AgentInfo),
        (status = 400, description = "Invalid payload", body = crate::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::ErrorResponse)
    )
)]
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ServiceError> {
    let mut errors = ValidationErrors::new();
    validate_email(&body.email, "email", &mut errors);
    validate_required(&body.full_name, "full_name", "Full name", &mut errors);
    validate_min_length(&body.password, MIN_PASSWORD_LENGTH, "password", "Password", &mut errors);
    errors.into_result().map_err(ServiceError::Validation)?;

    let password_hash = hash(&body.password, state.config.bcrypt_cost).map_err(|e| {
        log::error!("Failed to hash password: {:?}", e);
        ServiceError::Internal("Failed to hash password".to_string())
    })?;

    let agent = state
        .create_agent(&body.email, &body.full_name, password_hash)
        .await?;
    Ok(HttpResponse::Created().json(AgentInfo::from(agent)))
}

/// Login endpoint (JSON)
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = crate::ErrorResponse)
    )
)]
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ServiceError> {
    let tokens = login_with(&state, &body.email, &body.password).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// Login endpoint (OAuth2 password form)
#[utoipa::path(
    post,
    path = "/api/auth/token",
    tag = "Authentication",
    request_body(content = TokenForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = crate::ErrorResponse)
    )
)]
pub async fn token(
    state: web::Data<AppState>,
    form: web::Form<TokenForm>,
) -> Result<HttpResponse, ServiceError> {
    let tokens = login_with(&state, &form.username, &form.password).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// Refresh access token
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Authentication",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed", body = TokenResponse),
        (status = 401, description = "Invalid refresh token", body = crate::ErrorResponse)
    )
)]
pub async fn refresh_token(
    state: web::Data<AppState>,
    body: web::Json<RefreshRequest>,
) -> Result<HttpResponse, ServiceError> {
    let claims = validate_token(&state.config.jwt, &body.refresh_token).map_err(|e| {
        log::warn!("Invalid refresh token: {:?}", e);
        ServiceError::Unauthorized("Invalid or expired refresh token".to_string())
    })?;

    if claims.token_type != REFRESH_TOKEN {
        return Err(ServiceError::Unauthorized("Invalid token type".to_string()));
    }

    let agent = state
        .find_agent(&claims.sub)
        .await?
        .filter(|agent| agent.is_active)
        .ok_or_else(|| ServiceError::Unauthorized("Session expired. Please login again.".to_string()))?;

    let access_token = generate_access_token(&state.config.jwt, &agent).map_err(token_error)?;
    Ok(HttpResponse::Ok().json(TokenResponse {
        access_token,
        refresh_token: body.refresh_token.clone(),
        token_type: "Bearer".to_string(),
        expires_in: access_token_expiry(&state.config.jwt),
    }))
}

/// Get current agent info
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Authentication",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current agent", body = AgentInfo),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse)
    )
)]
pub async fn me(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    let identity = authenticate(&req, &state).await?;
    let agent = state
        .find_agent(&identity.id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Agent not found".to_string()))?;
    Ok(HttpResponse::Ok().json(AgentInfo::from(agent)))
}

/// Activate or deactivate an agent (requires `agent:admin`)
#[utoipa::path(
    put,
    path = "/api/auth/agents/{id}/active",
    tag = "Authentication",
    request_body = SetActiveRequest,
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Agent ID")),
    responses(
        (status = 200, description = "Agent updated", body = AgentInfo),
        (status = 403, description = "Missing agent:admin", body = crate::ErrorResponse),
        (status = 404, description = "Agent not found", body = crate::ErrorResponse)
    )
)]
pub async fn set_active(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<SetActiveRequest>,
) -> Result<HttpResponse, ServiceError> {
    let identity = authenticate(&req, &state).await?;
    identity.require(PERMISSION_AGENT_ADMIN)?;

    let id = path.into_inner();
    if id == identity.id && !body.is_active {
        return Err(ServiceError::Validation(
            "Agents cannot deactivate themselves".to_string(),
        ));
    }

    let agent = state.set_agent_active(&id, body.is_active).await?;
    Ok(HttpResponse::Ok().json(AgentInfo::from(agent)))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/auth/register").route(web::post().to(register)))
        .service(web::resource("/auth/login").route(web::post().to(login)))
        .service(web::resource("/auth/token").route(web::post().to(token)))
        .service(web::resource("/auth/refresh").route(web::post().to(refresh_token)))
        .service(web::resource("/auth/me").route(web::get().to(me)))
        .service(web::resource("/auth/agents/{id}/active").route(web::put().to(set_active)));
}
