//! Indexing pipeline: per-file upsert inside savepoints, batch commits.

use super::{derive_project_name, resolve_root, FileOutcome, IndexReport};
use crate::catalog::{
    attach_tag, find_file_by_path, get_or_create_project, get_or_create_tag, insert_file, now_ts,
    project_exists, reactivate_file, set_active, update_file_info, Catalog, NewFile,
};
use crate::error::CodexError;
use crate::scan::{
    file_extension, read_file_info, walk_files, EligibilityFilter, PruneRules, TagRules, WalkItem,
};
use rusqlite::Connection;
use std::fs;
use std::path::Path;

/// Per-run settings shared by every file of one walk
struct RunContext<'a> {
    root: &'a Path,
    project_id: Option<i64>,
    tags: TagRules,
}

impl Catalog {
    /// Index every eligible file under `root`.
    ///
    /// With `project_id` all files go to that project, otherwise the project is
    /// derived from the first path segment under `root`.
    pub fn index_directory(
        &mut self,
        root: &Path,
        project_id: Option<i64>,
    ) -> crate::Result<IndexReport> {
        let (report, _) = self.index_tree(root, project_id)?;
        Ok(report)
    }

    /// Index `root`, then deactivate active records under it whose files are gone
    pub fn smart_reindex(
        &mut self,
        root: &Path,
        project_id: Option<i64>,
    ) -> crate::Result<IndexReport> {
        let (mut report, root) = self.index_tree(root, project_id)?;

        let tx = self.conn.transaction()?;
        let candidates: Vec<(i64, String)> = {
            let mut stmt = tx.prepare("SELECT id, path FROM files WHERE is_active = 1")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        for (id, path) in candidates {
            let path_ref = Path::new(&path);
            if path_ref.starts_with(&root) && !path_ref.exists() {
                set_active(&tx, id, false)?;
                tracing::debug!(path = %path, "deactivated missing file");
                report.files_deactivated += 1;
            }
        }
        tx.commit()?;

        tracing::info!(
            deactivated = report.files_deactivated,
            "smart reindex complete"
        );
        Ok(report)
    }

    fn index_tree(
        &mut self,
        root: &Path,
        project_id: Option<i64>,
    ) -> crate::Result<(IndexReport, std::path::PathBuf)> {
        let root = resolve_root(root)?;

        if let Some(id) = project_id {
            if !project_exists(&self.conn, id)? {
                return Err(CodexError::ProjectNotFound(id));
            }
        }

        let filter = EligibilityFilter::from_config(&self.config)?;
        let rules = PruneRules::from_config(&self.config)?;
        let ctx = RunContext {
            root: &root,
            project_id,
            tags: TagRules::from_config(&self.config.tags),
        };
        let batch_size = self.config.indexing.batch_size.max(1);

        tracing::info!(root = %root.display(), "indexing directory");

        let mut report = IndexReport::default();
        let mut pending = 0usize;
        let mut tx = self.conn.transaction()?;

        for item in walk_files(&root, &rules) {
            let path = match item {
                WalkItem::File(path) => path,
                WalkItem::Error(message) => {
                    tracing::warn!("{}", message);
                    report.errors.push(message);
                    continue;
                }
            };

            let size = match fs::metadata(&path) {
                Ok(meta) => meta.len(),
                Err(e) => {
                    report.files_skipped += 1;
                    report
                        .errors
                        .push(format!("Error processing {}: {}", path.display(), e));
                    continue;
                }
            };

            if let Err(reason) = filter.evaluate(&path, size) {
                tracing::debug!(path = %path.display(), %reason, "skipped");
                report.files_skipped += 1;
                continue;
            }

            let result = {
                let sp = tx.savepoint()?;
                match index_file(&sp, &ctx, &path) {
                    Ok(outcome) => sp.commit().map(|_| outcome).map_err(CodexError::from),
                    // Dropping the savepoint rolls the file back
                    Err(e) => Err(e),
                }
            };

            match result {
                Ok(outcome) => {
                    tracing::debug!(path = %path.display(), ?outcome, "indexed");
                    report.record(outcome);
                }
                Err(CodexError::Io(e)) => {
                    report.files_skipped += 1;
                    report
                        .errors
                        .push(format!("Error processing {}: {}", path.display(), e));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "file rolled back");
                    report
                        .errors
                        .push(format!("Error indexing {}: {}", path.display(), e));
                }
            }

            pending += 1;
            if pending >= batch_size {
                tx.commit()?;
                tx = self.conn.transaction()?;
                pending = 0;
            }
        }

        tx.commit()?;

        tracing::info!(
            indexed = report.files_indexed,
            updated = report.files_updated,
            reactivated = report.ghost_files_reactivated,
            unchanged = report.files_unchanged,
            skipped = report.files_skipped,
            errors = report.errors.len(),
            "indexing complete"
        );

        Ok((report, root))
    }
}

/// Upsert one eligible file. I/O failures surface as `CodexError::Io`.
fn index_file(conn: &Connection, ctx: &RunContext<'_>, path: &Path) -> crate::Result<FileOutcome> {
    let info = read_file_info(path)?;
    let path_str = path.to_string_lossy();
    let now = now_ts();

    let existing = find_file_by_path(conn, &path_str)?;

    if let Some(record) = &existing {
        if record.is_active {
            if record.content_hash.as_deref() == Some(info.content_hash.as_str()) {
                return Ok(FileOutcome::Unchanged);
            }
            update_file_info(conn, record.id, &info, now)?;
            return Ok(FileOutcome::Updated);
        }
    }

    let project_id = match ctx.project_id {
        Some(id) => id,
        None => get_or_create_project(conn, &derive_project_name(path, ctx.root), now)?,
    };

    if let Some(record) = existing {
        reactivate_file(conn, record.id, &info, Some(project_id), now)?;
        tracing::info!(path = %path_str, "reactivated ghost file");
        return Ok(FileOutcome::Reactivated);
    }

    let project_name: String = conn.query_row(
        "SELECT name FROM projects WHERE id = ?",
        [project_id],
        |row| row.get(0),
    )?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let filetype = file_extension(path);

    let file_id = insert_file(
        conn,
        &NewFile {
            filename: &filename,
            path: &path_str,
            filetype: &filetype,
            project_id,
            description: format!("Auto-indexed from {}", project_name),
            info: &info,
        },
        now,
    )?;

    for tag in ctx.tags.infer(path) {
        let tag_id = get_or_create_tag(conn, &tag, now)?;
        attach_tag(conn, file_id, tag_id)?;
    }

    Ok(FileOutcome::Indexed)
}
