use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Error is the domain error surface of the Coordinator, mapped onto HTTP
/// statuses at the API boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found")]
    NotFound,
    #[error("document is not yet searchable")]
    InProgress,
    #[error("a reindex is already running for namespace {0:?}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<search_lang::ParseError> for Error {
    fn from(err: search_lang::ParseError) -> Self {
        Error::BadRequest(err.to_string())
    }
}

impl From<models::InvalidNamespace> for Error {
    fn from(err: models::InvalidNamespace) -> Self {
        Error::BadRequest(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Internal(anyhow::Error::from(err))
    }
}

impl From<search_store::Error> for Error {
    fn from(err: search_store::Error) -> Self {
        Error::Internal(anyhow::Error::from(err))
    }
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::InProgress => StatusCode::ACCEPTED,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match &self {
            Error::Internal(err) => {
                tracing::error!(error = ?err, "API responding with internal error");
                "internal error, please retry the request".to_string()
            }
            other => other.to_string(),
        };
        (status, message).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn errors_map_onto_http_statuses() {
        assert_eq!(Error::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::InProgress.status(), StatusCode::ACCEPTED);
        assert_eq!(
            Error::Conflict("ns".to_string()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::BadRequest("bad".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn parse_diagnostics_become_bad_requests() {
        let err = Error::from(search_lang::compile_filter("$.a == yes").unwrap_err());
        let Error::BadRequest(message) = &err else {
            panic!("expected a BadRequest");
        };
        assert!(message.contains("yes"), "diagnostic names the token");
    }
}
