use actix_cors::Cors;
use actix_web::middleware::{Compress, Logger};
use actix_web::{http::header, web, App, HttpResponse, HttpServer, Responder};
use serde::{Deserialize, Serialize};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod config;
pub mod db;
pub mod documents;
pub mod error;
pub mod lead;
pub mod metrics;
pub mod quote;
pub mod validation;

pub use crate::config::AppConfig;
pub use crate::db::AppState;
pub use crate::error::ServiceError;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::token,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::me,
        crate::auth::handlers::set_active,
        crate::quote::handlers::submit_quote,
        crate::quote::handlers::list_quotes,
        crate::quote::handlers::get_quote,
        crate::quote::handlers::update_quote_status,
        crate::quote::handlers::regenerate_documents,
        crate::quote::handlers::delete_quote,
        crate::documents::handlers::download_document,
        crate::documents::handlers::upload_attachment,
        crate::documents::handlers::list_quote_files,
        crate::documents::handlers::download_quote_file,
        crate::documents::handlers::delete_quote_file,
        crate::lead::handlers::submit_lead,
        crate::lead::handlers::list_leads,
        crate::lead::handlers::get_lead,
        crate::lead::handlers::update_lead_status,
        crate::lead::handlers::delete_lead
    ),
    components(
        schemas(
            auth::model::AgentInfo,
            auth::model::RegisterRequest,
            auth::model::LoginRequest,
            auth::model::TokenForm,
            auth::model::TokenResponse,
            auth::model::RefreshRequest,
            auth::model::SetActiveRequest,
            quote::model::Quote,
            quote::model::QuoteSubmission,
            quote::model::QuoteStatusUpdate,
            quote::model::QuoteType,
            quote::model::QuoteStatus,
            quote::model::PersonalInfo,
            quote::model::AutoData,
            quote::model::Vehicle,
            quote::model::HomeDetails,
            quote::model::SpecialtyItem,
            quote::model::AdditionalInsured,
            quote::model::DocumentsResponse,
            quote::model::QuoteAttachment,
            quote::model::QuoteFile,
            quote::model::QuoteFilesResponse,
            quote::model::FileKind,
            documents::DocumentOutcome,
            lead::model::Lead,
            lead::model::LeadSubmission,
            lead::model::LeadStatusUpdate,
            lead::model::LeadStatus,
            ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Authentication", description = "Agent registration and tokens."),
        (name = "Quotes", description = "Quote submission, lifecycle and documents."),
        (name = "Leads", description = "Prospect intake and follow-up.")
    ),
    servers(
        (url = "http://127.0.0.1:8080", description = "Localhost server")
    )
)]
pub struct ApiDoc;

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

async fn metrics(state: web::Data<AppState>) -> impl Responder {
    match state.metrics.encode() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            log::error!("Failed to encode metrics: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to encode metrics"))
        }
    }
}

/// Routes shared by the server and the API tests.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(auth::handlers::config)
            .configure(quote::config)
            .configure(lead::config),
    )
    .service(web::resource("/health").route(web::get().to(health)))
    .service(web::resource("/metrics").route(web::get().to(metrics)));
}

fn cors(origins: &[String]) -> Cors {
    let mut cors = Cors::default();
    for origin in origins {
        cors = cors.allowed_origin(origin);
    }
    cors.allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CONTENT_TYPE,
        ])
        .supports_credentials()
        .max_age(3600)
}

pub async fn run() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    let bind = (config.host.clone(), config.port);
    let origins = config.cors_origins.clone();

    let app_state = match AppState::new(config).await {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!("Failed to open the record store. Please check DATABASE_URL in .env. Error: {}", e);
            std::process::exit(1);
        }
    };
    let openapi = ApiDoc::openapi();

    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    let store_state = app_state.clone();
    let result = HttpServer::new(move || {
        App::new()
            .wrap(Compress::default())
            .wrap(Logger::default())
            .wrap(cors(&origins))
            .app_data(app_state.clone())
            .configure(configure_app)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", openapi.clone()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind(bind)?
    .run()
    .await;

    store_state.store.close().await;
    result
}
