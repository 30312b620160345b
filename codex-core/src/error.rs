//! Error types for codex operations

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CodexError {
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Project with ID {0} not found")]
    ProjectNotFound(i64),

    #[error("{kind} with ID {id} not found")]
    RecordNotFound { kind: &'static str, id: i64 },

    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("Invalid size '{0}' (expected e.g. \"512KB\", \"50MB\", \"1GB\" or a byte count)")]
    InvalidSize(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config already exists at {}", .0.display())]
    ConfigExists(PathBuf),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Glob pattern error: {0}")]
    GlobPattern(String),

    #[error("Schema version mismatch: database is v{found}, expected v{expected}. Recreate the catalog database.")]
    SchemaVersionMismatch { found: i32, expected: i32 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CodexError {
    /// Stable machine-readable code for JSON error output
    pub fn code(&self) -> &'static str {
        match self {
            Self::DirectoryNotFound(_) => "directory_not_found",
            Self::ProjectNotFound(_) => "project_not_found",
            Self::RecordNotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::InvalidSize(_) | Self::ConfigParse(_) | Self::GlobPattern(_) => "invalid_config",
            Self::InvalidQuery(_) => "invalid_query",
            Self::ConfigExists(_) => "config_exists",
            Self::SchemaVersionMismatch { .. } => "schema_mismatch",
            Self::Database(_) => "database_error",
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
        }
    }
}
