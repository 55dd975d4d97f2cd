use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use futures::TryStreamExt;

use crate::auth::middleware::authenticate;
use crate::auth::model::{PERMISSION_QUOTE_READ, PERMISSION_QUOTE_WRITE};
use crate::error::ServiceError;
use crate::quote::model::{QuoteAttachment, QuoteFilesResponse, QuoteType};
use crate::AppState;

pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Download a rendered quote document
#[utoipa::path(
    get,
    path = "/api/quotes/{id}/documents/{quote_type}/{format}",
    tag = "Quotes",
    params(
        ("id" = String, Path, description = "Quote ID"),
        ("quote_type" = String, Path, description = "AUTO, HOME or SPECIALTY"),
        ("format" = String, Path, description = "docx or pdf")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Document file"),
        (status = 400, description = "Unknown quote type or format", body = crate::ErrorResponse),
        (status = 404, description = "Document not available", body = crate::ErrorResponse)
    )
)]
pub async fn download_document(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
) -> Result<HttpResponse, ServiceError> {
    let agent = authenticate(&req, &state).await?;
    agent.require(PERMISSION_QUOTE_READ)?;

    let (id, quote_type, format) = path.into_inner();
    let quote_type: QuoteType = quote_type.parse().map_err(ServiceError::Validation)?;

    let quote = state.get_quote(&agent, &id).await?;
    let outcome = quote.generated_documents.get(&quote_type).ok_or_else(|| {
        ServiceError::NotFound(format!("No {} document for quote '{}'", quote_type, id))
    })?;

    let file_path = match format.to_ascii_lowercase().as_str() {
        "docx" => outcome.docx_path(),
        "pdf" => outcome.pdf_path(),
        other => {
            return Err(ServiceError::Validation(format!(
                "Unknown document format '{}'",
                other
            )))
        }
    }
    .ok_or_else(|| {
        ServiceError::NotFound(format!("{} {} document is not available", quote_type, format))
    })?;

    let filename = std::path::Path::new(file_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.{}", quote_type.slug(), format));

    send_file(&req, file_path, filename)
}

fn send_file(req: &HttpRequest, path: &str, filename: String) -> Result<HttpResponse, ServiceError> {
    let file = NamedFile::open(path).map_err(|e| {
        log::warn!("Document {} missing on disk: {}", path, e);
        ServiceError::NotFound("Document file no longer exists".to_string())
    })?;

    Ok(file
        .set_content_disposition(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename)],
        })
        .into_response(req))
}

/// Read the `file` field of an upload. Other fields are ignored.
async fn read_upload(mut payload: Multipart) -> Result<(String, Vec<u8>), ServiceError> {
    let bad_request = |e: String| ServiceError::Validation(format!("Invalid upload: {}", e));
    let mut upload = None;

    while let Some(mut field) = payload.try_next().await.map_err(|e| bad_request(e.to_string()))? {
        let Some(disposition) = field.content_disposition() else {
            continue;
        };
        if disposition.get_name() != Some("file") {
            continue;
        }
        let filename = disposition
            .get_filename()
            .ok_or_else(|| bad_request("the file field has no filename".to_string()))?
            .to_string();

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| bad_request(e.to_string()))? {
            if data.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(bad_request(format!(
                    "file exceeds {} bytes",
                    MAX_UPLOAD_BYTES
                )));
            }
            data.extend_from_slice(&chunk);
        }
        upload = Some((filename, data));
    }

    match upload {
        Some((_, data)) if data.is_empty() => Err(bad_request("the file is empty".to_string())),
        Some(upload) => Ok(upload),
        None => Err(bad_request("no file field".to_string())),
    }
}

/// Upload a supporting document for a quote
#[utoipa::path(
    post,
    path = "/api/quotes/{id}/upload",
    tag = "Quotes",
    params(("id" = String, Path, description = "Quote ID")),
    request_body(content_type = "multipart/form-data", description = "A `file` field"),
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "File stored", body = QuoteAttachment),
        (status = 400, description = "Missing, empty or oversized file", body = crate::ErrorResponse),
        (status = 403, description = "Quote belongs to another agent", body = crate::ErrorResponse),
        (status = 404, description = "Quote not found", body = crate::ErrorResponse),
        (status = 409, description = "Name taken by a generated document", body = crate::ErrorResponse)
    )
)]
pub async fn upload_attachment(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, ServiceError> {
    let agent = authenticate(&req, &state).await?;
    agent.require(PERMISSION_QUOTE_WRITE)?;

    let id = path.into_inner();
    // Ownership is checked before the body is read.
    state.get_quote(&agent, &id).await?;
    let (filename, data) = read_upload(payload).await?;
    let attachment = state.upload_attachment(&agent, &id, &filename, data).await?;
    Ok(HttpResponse::Created().json(attachment))
}

/// List the files a quote owns
#[utoipa::path(
    get,
    path = "/api/quotes/{id}/files",
    tag = "Quotes",
    params(("id" = String, Path, description = "Quote ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Rendered documents and uploads on disk", body = QuoteFilesResponse),
        (status = 403, description = "Quote belongs to another agent", body = crate::ErrorResponse),
        (status = 404, description = "Quote not found", body = crate::ErrorResponse)
    )
)]
pub async fn list_quote_files(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let agent = authenticate(&req, &state).await?;
    agent.require(PERMISSION_QUOTE_READ)?;

    let quote_id = path.into_inner();
    let files = state.list_quote_files(&agent, &quote_id).await?;
    Ok(HttpResponse::Ok().json(QuoteFilesResponse { quote_id, files }))
}

#[utoipa::path(
    get,
    path = "/api/quotes/{id}/files/{filename}",
    tag = "Quotes",
    params(
        ("id" = String, Path, description = "Quote ID"),
        ("filename" = String, Path, description = "File name as listed")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "File content"),
        (status = 404, description = "No such file", body = crate::ErrorResponse)
    )
)]
pub async fn download_quote_file(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ServiceError> {
    let agent = authenticate(&req, &state).await?;
    agent.require(PERMISSION_QUOTE_READ)?;

    let (id, filename) = path.into_inner();
    let file = state.find_quote_file(&agent, &id, &filename).await?;
    send_file(&req, &file.path, file.filename)
}

#[utoipa::path(
    delete,
    path = "/api/quotes/{id}/files/{filename}",
    tag = "Quotes",
    params(
        ("id" = String, Path, description = "Quote ID"),
        ("filename" = String, Path, description = "File name as listed")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "File removed"),
        (status = 403, description = "Quote belongs to another agent", body = crate::ErrorResponse),
        (status = 404, description = "No such file", body = crate::ErrorResponse)
    )
)]
pub async fn delete_quote_file(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ServiceError> {
    let agent = authenticate(&req, &state).await?;
    agent.require(PERMISSION_QUOTE_WRITE)?;

    let (id, filename) = path.into_inner();
    state.delete_quote_file(&agent, &id, &filename).await?;
    Ok(HttpResponse::NoContent().finish())
}
