use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::db::store::StoreError;
use crate::ErrorResponse;

/// Request-level failures, mapped onto HTTP statuses.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("store error: {0}")]
    Store(StoreError),
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "NotFound",
            ServiceError::Conflict(_) => "Conflict",
            ServiceError::Forbidden(_) => "Forbidden",
            ServiceError::Unauthorized(_) => "Unauthorized",
            ServiceError::Validation(_) => "BadRequest",
            ServiceError::InvalidTransition(_) => "InvalidTransition",
            ServiceError::Store(_) | ServiceError::Internal(_) => "InternalServerError",
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => {
                ServiceError::NotFound(format!("{} '{}' not found", singular(&collection), id))
            }
            StoreError::DuplicateKey { .. } | StoreError::VersionConflict { .. } => {
                ServiceError::Conflict(err.to_string())
            }
            other => ServiceError::Store(other),
        }
    }
}

fn singular(collection: &str) -> &str {
    collection.strip_suffix('s').unwrap_or(collection)
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Validation(_) | ServiceError::InvalidTransition(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::Store(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ServiceError::Store(e) => {
                log::error!("Store failure: {}", e);
                "The record store is unavailable".to_string()
            }
            ServiceError::Internal(e) => {
                log::error!("Internal failure: {}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(self.kind(), &message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_request_errors() {
        let not_found: ServiceError = StoreError::NotFound {
            collection: "quotes".into(),
            id: "q1".into(),
        }
        .into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.to_string(), "quote 'q1' not found");

        let conflict: ServiceError = StoreError::VersionConflict {
            collection: "quotes".into(),
            id: "q1".into(),
            expected: 2,
        }
        .into();
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        let store: ServiceError = StoreError::InvalidCollection("Bad".into()).into();
        assert_eq!(store.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_is_bad_request() {
        let err = ServiceError::Validation("missing".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), "BadRequest");
    }
}
