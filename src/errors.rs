use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    InternalServerError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Helper for mapping any unknown error into internal error
pub fn internal_error<E: ToString>(err: E) -> AppError {
    AppError::InternalServerError(err.to_string())
}

/// Store failures surface as their own variant so they are told apart in logs
pub fn store_error(err: anyhow::Error) -> AppError {
    AppError::StoreError(format!("{err:#}"))
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::StoreError(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        let body = Json(json!({
            "message": self.to_string()
        }));

        (status, body).into_response()
    }
}

/// Failure of a single cluster query.
///
/// Display output is kept short since it ends up in the scheduler log line
/// of every failed poll.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP {status} {reason}")]
    Http { status: u16, reason: String },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("timed out")]
    Timeout,

    #[error("invalid response: {0}")]
    Parse(String),

    #[error("{0}")]
    Api(String),
}

impl ProviderError {
    pub fn short_message(&self) -> String {
        self.to_string()
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if let Some(status) = err.status() {
            ProviderError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            }
        } else if err.is_connect() {
            ProviderError::Connection(root_cause(&err))
        } else if err.is_decode() {
            ProviderError::Parse(root_cause(&err))
        } else {
            ProviderError::Api(err.to_string())
        }
    }
}

impl From<kube::Error> for ProviderError {
    fn from(err: kube::Error) -> Self {
        ProviderError::Api(root_cause(&err))
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Parse(err.to_string())
    }
}

impl From<anyhow::Error> for ProviderError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<kube::Error>() {
            Ok(kube_err) => kube_err.into(),
            Err(other) => ProviderError::Api(format!("{other:#}")),
        }
    }
}

/// Innermost message of an error chain.
fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn http_error_message_is_short() {
        let err = ProviderError::Http {
            status: 401,
            reason: "Unauthorized".to_string(),
        };
        assert_eq!(err.short_message(), "HTTP 401 Unauthorized");
        assert_eq!(ProviderError::Timeout.short_message(), "timed out");
    }

    #[test]
    fn json_errors_become_parse_errors() {
        let err: ProviderError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[tokio::test]
    async fn not_found_renders_json_message() {
        let response = AppError::NotFound("cluster c9".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["message"], "Not found: cluster c9");
    }
}
