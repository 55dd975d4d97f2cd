use actix_web::{web, HttpRequest, HttpResponse};

use super::model::{Lead, LeadListQuery, LeadStatusUpdate, LeadSubmission};
use crate::auth::middleware::authenticate;
use crate::error::ServiceError;
use crate::AppState;

/// Public lead intake
#[utoipa::path(
    post,
    path = "/api/leads/submit",
    tag = "Leads",
    request_body = LeadSubmission,
    responses(
        (status = 201, description = "Lead created", body = Lead),
        (status = 400, description = "Invalid lead", body = crate::ErrorResponse),
        (status = 409, description = "A lead with this email exists", body = crate::ErrorResponse)
    )
)]
pub async fn submit_lead(
    state: web::Data<AppState>,
    body: web::Json<LeadSubmission>,
) -> Result<HttpResponse, ServiceError> {
    let lead = state.submit_lead(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(lead))
}

#[utoipa::path(
    get,
    path = "/api/leads/list",
    tag = "Leads",
    params(LeadListQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Leads", body = Vec<Lead>),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse)
    )
)]
pub async fn list_leads(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<LeadListQuery>,
) -> Result<HttpResponse, ServiceError> {
    authenticate(&req, &state).await?;
    let leads = state.list_leads(&query).await?;
    Ok(HttpResponse::Ok().json(leads))
}

#[utoipa::path(
    get,
    path = "/api/leads/{id}",
    tag = "Leads",
    params(("id" = String, Path, description = "Lead ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Lead found", body = Lead),
        (status = 404, description = "Lead not found", body = crate::ErrorResponse)
    )
)]
pub async fn get_lead(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    authenticate(&req, &state).await?;
    let lead = state.get_lead(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(lead))
}

#[utoipa::path(
    put,
    path = "/api/leads/{id}/status",
    tag = "Leads",
    request_body = LeadStatusUpdate,
    params(("id" = String, Path, description = "Lead ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Status updated", body = Lead),
        (status = 400, description = "Transition not allowed", body = crate::ErrorResponse),
        (status = 404, description = "Lead not found", body = crate::ErrorResponse)
    )
)]
pub async fn update_lead_status(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<LeadStatusUpdate>,
) -> Result<HttpResponse, ServiceError> {
    authenticate(&req, &state).await?;
    let lead = state
        .update_lead_status(&path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(lead))
}

#[utoipa::path(
    delete,
    path = "/api/leads/{id}",
    tag = "Leads",
    params(("id" = String, Path, description = "Lead ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Lead deleted"),
        (status = 404, description = "Lead not found", body = crate::ErrorResponse)
    )
)]
pub async fn delete_lead(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    authenticate(&req, &state).await?;
    state.delete_lead(&path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/leads/submit").route(web::post().to(submit_lead)))
        .service(web::resource("/leads/list").route(web::get().to(list_leads)))
        .service(web::resource("/leads/{id}/status").route(web::put().to(update_lead_status)))
        .service(
            web::resource("/leads/{id}")
                .route(web::get().to(get_lead))
                .route(web::delete().to(delete_lead)),
        );
}
