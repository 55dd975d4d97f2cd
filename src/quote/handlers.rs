use actix_web::{web, HttpRequest, HttpResponse};

use super::model::{DocumentsResponse, Quote, QuoteListQuery, QuoteStatusUpdate, QuoteSubmission};
use crate::auth::middleware::authenticate;
use crate::documents::handlers as documents;
use crate::auth::model::{PERMISSION_QUOTE_READ, PERMISSION_QUOTE_WRITE};
use crate::error::ServiceError;
use crate::AppState;

/// Submit a quote request and render its documents
#[utoipa::path(
    post,
    path = "/api/quotes/submit",
    tag = "Quotes",
    request_body = QuoteSubmission,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Quote stored; per-type document outcomes included", body = Quote),
        (status = 400, description = "Invalid submission", body = crate::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse),
        (status = 403, description = "Missing quote:write", body = crate::ErrorResponse)
    )
)]
pub async fn submit_quote(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<QuoteSubmission>,
) -> Result<HttpResponse, ServiceError> {
    let agent = authenticate(&req, &state).await?;
    agent.require(PERMISSION_QUOTE_WRITE)?;

    let quote = state.submit_quote(&agent, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(quote))
}

/// List the caller's quotes
#[utoipa::path(
    get,
    path = "/api/quotes/list",
    tag = "Quotes",
    params(QuoteListQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Quotes owned by the caller", body = Vec<Quote>),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse)
    )
)]
pub async fn list_quotes(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<QuoteListQuery>,
) -> Result<HttpResponse, ServiceError> {
    let agent = authenticate(&req, &state).await?;
    agent.require(PERMISSION_QUOTE_READ)?;

    let quotes = state.list_quotes(&agent, &query).await?;
    Ok(HttpResponse::Ok().json(quotes))
}

#[utoipa::path(
    get,
    path = "/api/quotes/{id}",
    tag = "Quotes",
    params(("id" = String, Path, description = "Quote ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Quote found", body = Quote),
        (status = 403, description = "Quote belongs to another agent", body = crate::ErrorResponse),
        (status = 404, description = "Quote not found", body = crate::ErrorResponse)
    )
)]
pub async fn get_quote(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let agent = authenticate(&req, &state).await?;
    agent.require(PERMISSION_QUOTE_READ)?;

    let quote = state.get_quote(&agent, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(quote))
}

#[utoipa::path(
    put,
    path = "/api/quotes/{id}/status",
    tag = "Quotes",
    request_body = QuoteStatusUpdate,
    params(("id" = String, Path, description = "Quote ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Status updated", body = Quote),
        (status = 400, description = "Transition not allowed", body = crate::ErrorResponse),
        (status = 403, description = "Quote belongs to another agent", body = crate::ErrorResponse),
        (status = 404, description = "Quote not found", body = crate::ErrorResponse)
    )
)]
pub async fn update_quote_status(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<QuoteStatusUpdate>,
) -> Result<HttpResponse, ServiceError> {
    let agent = authenticate(&req, &state).await?;
    agent.require(PERMISSION_QUOTE_WRITE)?;

    let quote = state
        .update_quote_status(&agent, &path.into_inner(), body.status)
        .await?;
    Ok(HttpResponse::Ok().json(quote))
}

/// Render the quote's documents again
#[utoipa::path(
    post,
    path = "/api/quotes/{id}/documents",
    tag = "Quotes",
    params(("id" = String, Path, description = "Quote ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Per-type document outcomes", body = DocumentsResponse),
        (status = 403, description = "Quote belongs to another agent", body = crate::ErrorResponse),
        (status = 404, description = "Quote not found", body = crate::ErrorResponse)
    )
)]
pub async fn regenerate_documents(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let agent = authenticate(&req, &state).await?;
    agent.require(PERMISSION_QUOTE_WRITE)?;

    let quote_id = path.into_inner();
    let documents = state.regenerate_documents(&agent, &quote_id).await?;
    Ok(HttpResponse::Ok().json(DocumentsResponse {
        quote_id,
        documents,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/quotes/{id}",
    tag = "Quotes",
    params(("id" = String, Path, description = "Quote ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Quote deleted"),
        (status = 403, description = "Quote belongs to another agent", body = crate::ErrorResponse),
        (status = 404, description = "Quote not found", body = crate::ErrorResponse)
    )
)]
pub async fn delete_quote(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let agent = authenticate(&req, &state).await?;
    agent.require(PERMISSION_QUOTE_WRITE)?;

    state.delete_quote(&agent, &path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/quotes/submit").route(web::post().to(submit_quote)))
        .service(web::resource("/quotes/list").route(web::get().to(list_quotes)))
        .service(
            web::resource("/quotes/{id}/status").route(web::put().to(update_quote_status)),
        )
        .service(
            web::resource("/quotes/{id}/documents")
                .route(web::post().to(regenerate_documents)),
        )
        .service(
            web::resource("/quotes/{id}/documents/{quote_type}/{format}")
                .route(web::get().to(documents::download_document)),
        )
        .service(web::resource("/quotes/{id}/upload").route(web::post().to(documents::upload_attachment)))
        .service(web::resource("/quotes/{id}/files").route(web::get().to(documents::list_quote_files)))
        .service(
            web::resource("/quotes/{id}/files/{filename}")
                .route(web::get().to(documents::download_quote_file))
                .route(web::delete().to(documents::delete_quote_file)),
        )
        .service(
            web::resource("/quotes/{id}")
                .route(web::get().to(get_quote))
                .route(web::delete().to(delete_quote)),
        );
}
