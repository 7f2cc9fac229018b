//! Error bridge between the domain taxonomy and HTTP responses.
//!
//! Domain errors arrive as typed values and leave as structured
//! `{code, message}` JSON bodies with the appropriate status. Server-side
//! failures are logged with their source; secrets and signing keys never
//! appear in any response (the domain errors never carry them).

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;

use ticket_registry_core::{LedgerError, RejectionReason, TicketError};

/// HTTP-facing application error.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: &'static str,
    source: Option<anyhow::Error>,
}

impl ApiError {
    /// Creates an error with an explicit status and client code.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Attaches the underlying cause, for server-side logging only.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "LEDGER_UNAVAILABLE", message)
    }

    #[cfg(test)]
    pub(crate) const fn status(&self) -> StatusCode {
        self.status
    }

    #[cfg(test)]
    pub(crate) const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    error = %source,
                    "request failed"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "request failed"
                ),
            }
        }
        let body = ErrorBody {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<TicketError> for ApiError {
    fn from(err: TicketError) -> Self {
        match err {
            TicketError::Validation(message) => Self::bad_request(message),
            TicketError::NotFound(ticket_id) => {
                Self::not_found(format!("ticket {ticket_id} not found in metadata store"))
            }
            TicketError::AlreadyUsed(ticket_id) => Self::new(
                StatusCode::CONFLICT,
                "ALREADY_USED",
                format!("ticket {ticket_id} has already been used"),
            ),
            TicketError::NotValid(ticket_id) => Self::new(
                StatusCode::CONFLICT,
                "NOT_VALID",
                format!("ticket {ticket_id} is not valid on the ledger"),
            ),
            TicketError::Ledger(err) => err.into(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidRequest(message) => Self::bad_request(message),
            LedgerError::Transient(message) => {
                Self::unavailable("ledger temporarily unavailable")
                    .with_source(anyhow::anyhow!(message))
            }
            LedgerError::Rejected(reason) => match reason {
                RejectionReason::UnknownCommitment | RejectionReason::UnknownEvent => {
                    Self::not_found(reason.to_string())
                }
                RejectionReason::NotTicketOwner => {
                    Self::new(StatusCode::FORBIDDEN, "NOT_TICKET_OWNER", reason.to_string())
                }
                RejectionReason::AlreadyUsed => {
                    Self::new(StatusCode::CONFLICT, "ALREADY_USED", reason.to_string())
                }
                RejectionReason::DuplicateCommitment
                | RejectionReason::EventInactive
                | RejectionReason::Other(_) => {
                    Self::new(StatusCode::CONFLICT, "LEDGER_REJECTED", reason.to_string())
                }
            },
        }
    }
}
