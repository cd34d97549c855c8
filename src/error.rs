use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors surfaced by the predictor, the rating store and the import job.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Model has not been trained yet; call POST /api/train first")]
    ModelNotTrained,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database still unreachable after {attempts} attempts")]
    StoreUnavailable { attempts: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Internal(err.to_string())
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::ModelNotTrained | Error::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Csv(_)
            | Error::Io(_)
            | Error::MalformedRecord { .. }
            | Error::Database(_)
            | Error::Config(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::ModelNotTrained.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            Error::InvalidInput("num_recommendations".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::MalformedRecord { line: 3, reason: "bad".into() }.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::StoreUnavailable { attempts: 3 }.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
