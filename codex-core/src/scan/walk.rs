//! Directory walking with traversal-time pruning (ignore crate).

use crate::config::Config;
use crate::error::CodexError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One item produced by a walk
#[derive(Debug)]
pub enum WalkItem {
    File(PathBuf),
    /// Unreadable directory, entry or non-UTF-8 file path; the walk continues
    Error(String),
}

/// Prune rules shared by indexing and reconciliation walks
#[derive(Debug, Clone)]
pub struct PruneRules {
    directories: HashSet<String>,
    patterns: GlobSet,
    respect_gitignore: bool,
}

impl PruneRules {
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.ignore.patterns {
            let glob_pattern = if pattern.contains('*') || pattern.contains('?') {
                pattern.clone()
            } else {
                format!("**/{}", pattern)
            };
            builder.add(
                Glob::new(&glob_pattern).map_err(|e| CodexError::GlobPattern(e.to_string()))?,
            );
        }
        let patterns = builder
            .build()
            .map_err(|e| CodexError::GlobPattern(e.to_string()))?;

        Ok(Self {
            directories: config.ignore.directories.iter().cloned().collect(),
            patterns,
            respect_gitignore: config.indexing.respect_gitignore,
        })
    }

    /// Whether the walker must not yield or descend into `entry`
    fn prunes(&self, root: &Path, entry: &DirEntry) -> bool {
        // Never prune the root, even when its own name is hidden
        if entry.depth() == 0 {
            return false;
        }

        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            return true;
        }

        let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
        if is_dir && self.directories.contains(name.as_ref()) {
            return true;
        }

        if !self.patterns.is_empty() {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if self.patterns.is_match(relative) {
                return true;
            }
        }

        false
    }
}

/// Walk `root` depth-first, yielding regular files. Hidden entries and
/// block-listed directories are pruned before descent; symlinks are not followed.
pub fn walk_files(root: &Path, rules: &PruneRules) -> impl Iterator<Item = WalkItem> {
    let mut builder = WalkBuilder::new(root);
    builder.standard_filters(false);
    builder.follow_links(false);
    builder.sort_by_file_name(|a, b| a.cmp(b));
    if rules.respect_gitignore {
        builder.git_ignore(true);
        builder.git_global(true);
        builder.git_exclude(true);
    }

    let filter_rules = Arc::new(rules.clone());
    let filter_root = root.to_path_buf();
    builder.filter_entry(move |entry| !filter_rules.prunes(&filter_root, entry));

    builder.build().filter_map(|entry| match entry {
        Ok(entry) => {
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                return None;
            }
            // Catalog paths are TEXT and must name the file they came from
            if entry.path().to_str().is_none() {
                return Some(WalkItem::Error(format!(
                    "Skipping non-UTF-8 path: {}",
                    entry.path().display()
                )));
            }
            Some(WalkItem::File(entry.into_path()))
        }
        Err(err) => Some(WalkItem::Error(format!("Walk error: {}", err))),
    })
}
