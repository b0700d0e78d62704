use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sessiongate_core::envelope::{Envelope, CODE_GENERAL_FAILED};
use sessiongate_core::SessionError;
use thiserror::Error;
use tracing::error;

/// Failures the session middleware and extractors turn into responses
#[derive(Debug, Error)]
pub enum SessionRejection {
    /// The strict-auth attribute is missing from the session
    #[error("session lacks required attribute")]
    Unauthorized,

    /// Committing the session failed
    #[error(transparent)]
    Storage(#[from] SessionError),

    /// A handler asked for a session on a route without the session layer
    #[error("session layer is not installed on this route")]
    MissingLayer,
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        let envelope = match &self {
            Self::Unauthorized => Envelope::auth_failed(),
            Self::Storage(e) => {
                error!(error = %e, "Session storage failure");
                Envelope::storage_failed()
            }
            Self::MissingLayer => {
                error!("Session requested on a route without SessionLayer");
                Envelope::wrap(None)
                    .with_status(500)
                    .with_code(CODE_GENERAL_FAILED)
                    .with_message(self.to_string())
            }
        };

        let status =
            StatusCode::from_u16(envelope.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(envelope)).into_response()
    }
}
