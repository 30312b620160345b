use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use codex_core::CodexError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub hint: String,
}

impl ErrorEnvelope {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            hint: hint.into(),
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self::new("internal_error", msg, "Check service logs for details")
    }
}

pub struct AppError {
    pub status: StatusCode,
    pub body: ErrorEnvelope,
}

impl AppError {
    pub fn internal(msg: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorEnvelope::internal(&msg.to_string()),
        }
    }

    pub fn confirmation_required(fixable: usize) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorEnvelope::new(
                "confirmation_required",
                format!("{} fixes pending; refusing to apply without confirmation", fixable),
                "Send {\"confirm\": true} or enable reconcile.auto_fix",
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, axum::Json(self.body)).into_response()
    }
}

fn hint_for(err: &CodexError) -> &'static str {
    match err {
        CodexError::DirectoryNotFound(_) => "Check the directory path exists on the service host",
        CodexError::ProjectNotFound(_) => "List projects with GET /projects",
        CodexError::RecordNotFound { .. } => "Check the ID and try again",
        CodexError::AlreadyExists { .. } => "Choose a different name",
        CodexError::InvalidQuery(_) => "Pass a non-empty q parameter",
        CodexError::SchemaVersionMismatch { .. } => "Recreate the catalog database",
        _ => "Check service logs for details",
    }
}

impl From<CodexError> for AppError {
    fn from(err: CodexError) -> Self {
        let status = match &err {
            CodexError::DirectoryNotFound(_)
            | CodexError::ProjectNotFound(_)
            | CodexError::RecordNotFound { .. } => StatusCode::NOT_FOUND,
            CodexError::AlreadyExists { .. } => StatusCode::CONFLICT,
            CodexError::InvalidQuery(_)
            | CodexError::InvalidSize(_)
            | CodexError::GlobPattern(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "request failed");
        }
        Self {
            status,
            body: ErrorEnvelope::new(err.code(), err.to_string(), hint_for(&err)),
        }
    }
}
