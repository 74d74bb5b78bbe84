use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use thiserror::Error;

/// Failure modes of every exchange operation, mapped one-to-one onto HTTP statuses.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// No or invalid session.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to do this.
    #[error("{0}")]
    Forbidden(String),

    /// Anything unexpected. The inner error is logged, never sent to the caller.
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;

impl ExchangeError {
    pub fn validation(message: impl Into<String>) -> Self {
        ExchangeError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ExchangeError::NotFound(message.into())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl ResponseError for ExchangeError {
    fn status_code(&self) -> StatusCode {
        match self {
            ExchangeError::Validation(_) => StatusCode::BAD_REQUEST,
            ExchangeError::NotFound(_) => StatusCode::NOT_FOUND,
            ExchangeError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ExchangeError::Forbidden(_) => StatusCode::FORBIDDEN,
            ExchangeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ExchangeError::Internal(e) = self {
            log::error!("Internal error: {:#}", e);
        }
        HttpResponse::build(self.status_code()).json(ErrorBody {
            message: self.to_string(),
        })
    }
}
