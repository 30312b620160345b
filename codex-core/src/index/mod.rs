//! Directory indexing: walk, filter, upsert into the catalog

mod pipeline;

use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::CodexError;

/// Project used for files directly under the scan root
pub const DEFAULT_PROJECT: &str = "Default";

/// What happened to one eligible file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// New record inserted
    Indexed,
    /// Active record refreshed after a content change
    Updated,
    /// Inactive record brought back to life
    Reactivated,
    /// Active record with identical hash
    Unchanged,
}

/// Counters accumulated over one walk
#[derive(Debug, Default, Serialize)]
pub struct IndexReport {
    pub files_indexed: usize,
    pub files_updated: usize,
    pub ghost_files_reactivated: usize,
    pub files_unchanged: usize,
    pub files_skipped: usize,
    /// Only set by smart reindex
    pub files_deactivated: usize,
    pub errors: Vec<String>,
}

impl IndexReport {
    pub(crate) fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Indexed => self.files_indexed += 1,
            FileOutcome::Updated => self.files_updated += 1,
            FileOutcome::Reactivated => self.ghost_files_reactivated += 1,
            FileOutcome::Unchanged => self.files_unchanged += 1,
        }
    }

    /// Eligible files that reached the database
    pub fn files_processed(&self) -> usize {
        self.files_indexed + self.files_updated + self.ghost_files_reactivated + self.files_unchanged
    }

    /// Copy of the report with at most `max` errors
    pub fn capped(&self, max: usize) -> Self {
        Self {
            errors: self.errors.iter().take(max).cloned().collect(),
            ..*self
        }
    }
}

/// Project name for `path` under `root`: the first relative path segment,
/// or [`DEFAULT_PROJECT`] for files directly under the root.
pub fn derive_project_name(path: &Path, root: &Path) -> String {
    let Ok(relative) = path.strip_prefix(root) else {
        return DEFAULT_PROJECT.to_string();
    };

    let mut components = relative.components().filter_map(|c| match c {
        Component::Normal(name) => Some(name),
        _ => None,
    });
    match (components.next(), components.next()) {
        (Some(first), Some(_)) => first.to_string_lossy().into_owned(),
        _ => DEFAULT_PROJECT.to_string(),
    }
}

/// Canonical absolute scan root; missing roots and non-directories are rejected
pub(crate) fn resolve_root(root: &Path) -> crate::Result<PathBuf> {
    match fs::canonicalize(root) {
        Ok(path) if path.is_dir() => Ok(path),
        _ => Err(CodexError::DirectoryNotFound(root.to_path_buf())),
    }
}
