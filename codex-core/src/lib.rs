//! Codex Core - code-file catalog with indexing and disk/database reconciliation
//!
//! Codex walks a source tree, records eligible files (size, line count,
//! content hash, project, tags) in a SQLite catalog, and reconciles that
//! catalog against the filesystem when the two drift apart.

pub mod catalog;
pub mod config;
pub mod error;
pub mod index;
pub mod reconcile;
pub mod scan;

pub use catalog::{
    format_timestamp, Catalog, CatalogStats, FileRecord, Project, SearchHit, SearchPage,
    SearchQuery, Tag,
};
pub use config::Config;
pub use error::CodexError;
pub use index::{derive_project_name, FileOutcome, IndexReport};
pub use reconcile::{FixAction, FixReport, Issue, IssueKind, ReconcileAnalysis};

/// Result type for codex operations
pub type Result<T> = std::result::Result<T, CodexError>;
