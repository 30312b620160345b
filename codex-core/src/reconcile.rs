//! Disk/database reconciliation: classify drift between the catalog and the
//! filesystem, then repair it in a single transaction.
//!
//! Classification works on two sets, eligible paths found by walking the root
//! and every record in the catalog. Records outside the walked set fall back
//! to a filesystem existence check, so a catalog spanning several roots is
//! never misread as orphaned.

use crate::catalog::{
    all_files, delete_file, now_ts, reactivate_file, set_content_hash, Catalog, FileRecord,
};
use crate::index::resolve_root;
use crate::scan::{hash_file, read_file_info, walk_files, EligibilityFilter, PruneRules, WalkItem};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Active record whose file is gone
    OrphanedDbRecord,
    /// Eligible file with no record at all
    OrphanedDiskFile,
    /// Inactive record whose file exists
    GhostFile,
    /// Extra record sharing a path with a newer one
    DuplicateRecord,
    /// Stored hash missing or stale
    HashMismatch,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::OrphanedDbRecord => "orphaned DB record",
            Self::OrphanedDiskFile => "orphaned disk file",
            Self::GhostFile => "ghost file",
            Self::DuplicateRecord => "duplicate record",
            Self::HashMismatch => "hash mismatch",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub path: String,
    /// `None` for orphaned disk files
    pub record_id: Option<i64>,
}

/// Read-only classification of one root
#[derive(Debug, Default, Serialize)]
pub struct ReconcileAnalysis {
    pub root: String,
    pub files_on_disk: usize,
    pub records_in_db: usize,
    pub orphaned_db_records: usize,
    pub orphaned_disk_files: usize,
    pub ghost_files: usize,
    pub duplicate_records: usize,
    pub hash_mismatches: usize,
    pub issues: Vec<Issue>,
    /// Walk and hashing failures; the affected entries are left unclassified
    pub errors: Vec<String>,
}

impl ReconcileAnalysis {
    fn push(&mut self, kind: IssueKind, path: &str, record_id: Option<i64>) {
        match kind {
            IssueKind::OrphanedDbRecord => self.orphaned_db_records += 1,
            IssueKind::OrphanedDiskFile => self.orphaned_disk_files += 1,
            IssueKind::GhostFile => self.ghost_files += 1,
            IssueKind::DuplicateRecord => self.duplicate_records += 1,
            IssueKind::HashMismatch => self.hash_mismatches += 1,
        }
        self.issues.push(Issue {
            kind,
            path: path.to_string(),
            record_id,
        });
    }

    pub fn total_issues(&self) -> usize {
        self.issues.len()
    }

    /// Issues that `fix` acts on (orphaned disk files are report-only)
    pub fn fixable_issues(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.kind != IssueKind::OrphanedDiskFile)
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }
}

/// One repair applied by `fix`
#[derive(Debug, Clone, Serialize)]
pub struct FixAction {
    pub kind: IssueKind,
    pub record_id: i64,
    pub path: String,
    pub action: &'static str,
}

#[derive(Debug, Default, Serialize)]
pub struct FixReport {
    pub ghosts_reactivated: usize,
    pub orphans_removed: usize,
    pub duplicates_removed: usize,
    pub hashes_refreshed: usize,
    /// Reported only; a reindex adds them
    pub orphaned_disk_files: usize,
    pub actions: Vec<FixAction>,
    pub errors: Vec<String>,
}

impl FixReport {
    pub fn total_fixed(&self) -> usize {
        self.actions.len()
    }

    fn push(&mut self, kind: IssueKind, record_id: i64, path: &str, action: &'static str) {
        self.actions.push(FixAction {
            kind,
            record_id,
            path: path.to_string(),
            action,
        });
    }
}

/// Records sharing a path, most recently indexed first (ties: highest id)
fn group_by_path(records: Vec<FileRecord>) -> HashMap<String, Vec<FileRecord>> {
    let mut groups: HashMap<String, Vec<FileRecord>> = HashMap::new();
    for record in records {
        groups.entry(record.path.clone()).or_default().push(record);
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at).then(b.id.cmp(&a.id)));
    }
    groups
}

impl Catalog {
    /// Classify discrepancies between the catalog and the files under `root`.
    /// Read-only.
    pub fn analyze(&self, root: &Path) -> crate::Result<ReconcileAnalysis> {
        let root = resolve_root(root)?;
        let filter = EligibilityFilter::from_config(&self.config)?;
        let rules = PruneRules::from_config(&self.config)?;

        let mut analysis = ReconcileAnalysis {
            root: root.to_string_lossy().into_owned(),
            ..Default::default()
        };

        let mut on_disk: HashSet<String> = HashSet::new();
        for item in walk_files(&root, &rules) {
            match item {
                WalkItem::File(path) => {
                    if filter.should_index(&path) {
                        on_disk.insert(path.to_string_lossy().into_owned());
                    }
                }
                WalkItem::Error(message) => analysis.errors.push(message),
            }
        }

        let records = all_files(&self.conn)?;
        analysis.files_on_disk = on_disk.len();
        analysis.records_in_db = records.len();

        let present = |path: &str| on_disk.contains(path) || Path::new(path).is_file();

        let mut groups: Vec<(String, Vec<FileRecord>)> = group_by_path(records).into_iter().collect();
        groups.sort_by(|a, b| a.0.cmp(&b.0));

        for (path, group) in &groups {
            for duplicate in group.iter().skip(1) {
                analysis.push(IssueKind::DuplicateRecord, path, Some(duplicate.id));
            }

            let exists = present(path);
            for record in group {
                match (record.is_active, exists) {
                    (true, false) => analysis.push(IssueKind::OrphanedDbRecord, path, Some(record.id)),
                    (false, true) => analysis.push(IssueKind::GhostFile, path, Some(record.id)),
                    (true, true) => match hash_file(Path::new(path)) {
                        Ok(actual) if record.content_hash.as_deref() == Some(actual.as_str()) => {}
                        Ok(_) => analysis.push(IssueKind::HashMismatch, path, Some(record.id)),
                        Err(e) => analysis
                            .errors
                            .push(format!("Error hashing {}: {}", path, e)),
                    },
                    (false, false) => {}
                }
            }
        }

        let recorded: HashSet<&str> = groups.iter().map(|(path, _)| path.as_str()).collect();
        let mut unrecorded: Vec<&String> = on_disk
            .iter()
            .filter(|p| !recorded.contains(p.as_str()))
            .collect();
        unrecorded.sort();
        for path in unrecorded {
            analysis.push(IssueKind::OrphanedDiskFile, path, None);
        }

        tracing::info!(
            root = %analysis.root,
            orphaned_db = analysis.orphaned_db_records,
            orphaned_disk = analysis.orphaned_disk_files,
            ghosts = analysis.ghost_files,
            duplicates = analysis.duplicate_records,
            hash_mismatches = analysis.hash_mismatches,
            "reconciliation analysis complete"
        );

        Ok(analysis)
    }

    /// Analyze `root` and repair everything fixable in one transaction.
    ///
    /// Order: reactivate ghosts, delete orphaned records, collapse duplicates,
    /// refresh stale hashes. Any failure rolls back the whole repair.
    pub fn fix(&mut self, root: &Path) -> crate::Result<FixReport> {
        let analysis = self.analyze(root)?;
        let mut report = FixReport {
            orphaned_disk_files: analysis.orphaned_disk_files,
            errors: analysis.errors.clone(),
            ..Default::default()
        };

        let now = now_ts();
        let tx = self.conn.transaction()?;

        for issue in analysis.of_kind(IssueKind::GhostFile) {
            let Some(id) = issue.record_id else { continue };
            let info = read_file_info(Path::new(&issue.path))?;
            reactivate_file(&tx, id, &info, None, now)?;
            report.ghosts_reactivated += 1;
            report.push(IssueKind::GhostFile, id, &issue.path, "reactivated");
        }

        for issue in analysis.of_kind(IssueKind::OrphanedDbRecord) {
            let Some(id) = issue.record_id else { continue };
            if delete_file(&tx, id)? > 0 {
                report.orphans_removed += 1;
                report.push(IssueKind::OrphanedDbRecord, id, &issue.path, "deleted");
            }
        }

        // Earlier steps may already have removed some duplicates
        let remaining = group_by_path(all_files(&tx)?);
        let mut duplicate_paths: Vec<&String> = remaining
            .iter()
            .filter(|(_, group)| group.len() > 1)
            .map(|(path, _)| path)
            .collect();
        duplicate_paths.sort();
        for path in duplicate_paths {
            for duplicate in remaining[path].iter().skip(1) {
                delete_file(&tx, duplicate.id)?;
                report.duplicates_removed += 1;
                report.push(IssueKind::DuplicateRecord, duplicate.id, path, "deleted");
            }
        }

        for issue in analysis.of_kind(IssueKind::HashMismatch) {
            let Some(id) = issue.record_id else { continue };
            let hash = hash_file(Path::new(&issue.path))?;
            if set_content_hash(&tx, id, &hash, now)? > 0 {
                report.hashes_refreshed += 1;
                report.push(IssueKind::HashMismatch, id, &issue.path, "hash refreshed");
            }
        }

        tx.commit()?;

        tracing::info!(
            ghosts = report.ghosts_reactivated,
            orphans = report.orphans_removed,
            duplicates = report.duplicates_removed,
            hashes = report.hashes_refreshed,
            "reconciliation fixes applied"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::CodexError;
    use rusqlite::params;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn indexed(files: &[(&str, &[u8])]) -> (TempDir, Catalog) {
        let dir = TempDir::new().unwrap();
        for (rel, content) in files {
            write(dir.path(), rel, content);
        }
        let mut catalog = Catalog::open_in_memory(Config::default()).unwrap();
        catalog.index_directory(dir.path(), None).unwrap();
        (dir, catalog)
    }

    fn record(catalog: &Catalog, root: &Path, rel: &str) -> FileRecord {
        let path = fs::canonicalize(root.join(rel)).unwrap();
        catalog
            .file_by_path(&path.to_string_lossy())
            .unwrap()
            .unwrap()
    }

    fn kinds(analysis: &ReconcileAnalysis) -> Vec<IssueKind> {
        analysis.issues.iter().map(|i| i.kind).collect()
    }

    #[test]
    fn test_clean_catalog() {
        let (dir, catalog) = indexed(&[("a/x.py", b"x = 1\n"), ("b/y.md", b"# y\n")]);
        let analysis = catalog.analyze(dir.path()).unwrap();
        assert!(analysis.is_clean(), "{:?}", analysis.issues);
        assert_eq!(analysis.files_on_disk, 2);
        assert_eq!(analysis.records_in_db, 2);
    }

    #[test]
    fn test_deleted_file_is_orphaned_then_removed() {
        let (dir, mut catalog) = indexed(&[("a/x.py", b"x = 1\n"), ("b/z.py", b"z = 1\n")]);
        let z = record(&catalog, dir.path(), "b/z.py");
        fs::remove_file(dir.path().join("b/z.py")).unwrap();

        let analysis = catalog.analyze(dir.path()).unwrap();
        assert_eq!(kinds(&analysis), vec![IssueKind::OrphanedDbRecord]);
        assert_eq!(analysis.issues[0].record_id, Some(z.id));

        let report = catalog.fix(dir.path()).unwrap();
        assert_eq!(report.orphans_removed, 1);
        assert!(matches!(
            catalog.get_file(z.id),
            Err(CodexError::RecordNotFound { .. })
        ));

        assert!(catalog.analyze(dir.path()).unwrap().is_clean());
    }

    #[test]
    fn test_unrecorded_file_is_only_an_orphaned_disk_file() {
        let (dir, mut catalog) = indexed(&[("a/x.py", b"x = 1\n")]);
        write(dir.path(), "a/new.py", b"new = True\n");

        let analysis = catalog.analyze(dir.path()).unwrap();
        assert_eq!(kinds(&analysis), vec![IssueKind::OrphanedDiskFile]);
        assert_eq!(analysis.fixable_issues(), 0);
        assert!(analysis.issues[0].path.ends_with("new.py"));

        // Reported, never inserted by fix
        let report = catalog.fix(dir.path()).unwrap();
        assert_eq!(report.orphaned_disk_files, 1);
        assert_eq!(report.total_fixed(), 0);
        assert_eq!(catalog.files().unwrap().len(), 1);
    }

    #[test]
    fn test_ineligible_files_are_not_orphans() {
        let (dir, catalog) = indexed(&[("a/x.py", b"x = 1\n")]);
        write(dir.path(), "a/blob.bin", &[0, 1, 2]);
        write(dir.path(), "node_modules/pkg/index.js", b"module.exports = 1\n");

        assert!(catalog.analyze(dir.path()).unwrap().is_clean());
    }

    #[test]
    fn test_hash_mismatch_repair_restores_equality() {
        let (dir, mut catalog) = indexed(&[("a/x.py", b"x = 1\n"), ("a/y.py", b"y = 2\n")]);
        let x = record(&catalog, dir.path(), "a/x.py");
        let y = record(&catalog, dir.path(), "a/y.py");
        catalog
            .conn
            .execute("UPDATE files SET content_hash = 'stale' WHERE id = ?", params![x.id])
            .unwrap();
        catalog
            .conn
            .execute("UPDATE files SET content_hash = NULL WHERE id = ?", params![y.id])
            .unwrap();

        let analysis = catalog.analyze(dir.path()).unwrap();
        assert_eq!(analysis.hash_mismatches, 2);

        let report = catalog.fix(dir.path()).unwrap();
        assert_eq!(report.hashes_refreshed, 2);

        for (id, rel) in [(x.id, "a/x.py"), (y.id, "a/y.py")] {
            let actual = hash_file(&dir.path().join(rel)).unwrap();
            assert_eq!(catalog.get_file(id).unwrap().content_hash, Some(actual));
        }
        assert!(catalog.analyze(dir.path()).unwrap().is_clean());
    }

    #[test]
    fn test_ghost_file_is_reactivated() {
        let (dir, mut catalog) = indexed(&[("a/x.py", b"x = 1\n")]);
        let x = record(&catalog, dir.path(), "a/x.py");
        catalog.deactivate_file(x.id).unwrap();
        write(dir.path(), "a/x.py", b"x = 1\nx += 1\n");

        let analysis = catalog.analyze(dir.path()).unwrap();
        assert_eq!(kinds(&analysis), vec![IssueKind::GhostFile]);

        let report = catalog.fix(dir.path()).unwrap();
        assert_eq!(report.ghosts_reactivated, 1);

        let revived = catalog.get_file(x.id).unwrap();
        assert!(revived.is_active);
        assert_eq!(revived.line_count, 2);
        assert_eq!(
            revived.content_hash,
            Some(hash_file(&dir.path().join("a/x.py")).unwrap())
        );
        assert!(catalog.analyze(dir.path()).unwrap().is_clean());
    }

    #[test]
    fn test_duplicates_keep_most_recent_record() {
        let (dir, mut catalog) = indexed(&[("a/x.py", b"x = 1\n")]);
        let x = record(&catalog, dir.path(), "a/x.py");

        catalog.conn.execute_batch("DROP INDEX idx_files_path;").unwrap();
        catalog
            .conn
            .execute(
                "INSERT INTO files (filename, path, filetype, project_id, size, line_count,
                                    indexed_at, content_hash, is_active)
                 SELECT filename, path, filetype, project_id, size, line_count,
                        indexed_at - 100, content_hash, is_active
                 FROM files WHERE id = ?",
                params![x.id],
            )
            .unwrap();
        let older_id = catalog.conn.last_insert_rowid();

        let analysis = catalog.analyze(dir.path()).unwrap();
        assert_eq!(kinds(&analysis), vec![IssueKind::DuplicateRecord]);
        assert_eq!(analysis.issues[0].record_id, Some(older_id));

        let report = catalog.fix(dir.path()).unwrap();
        assert_eq!(report.duplicates_removed, 1);
        assert!(catalog.get_file(x.id).is_ok());
        assert!(catalog.get_file(older_id).is_err());
    }

    #[test]
    fn test_duplicate_tie_keeps_highest_id() {
        let (dir, mut catalog) = indexed(&[("a/x.py", b"x = 1\n")]);
        let x = record(&catalog, dir.path(), "a/x.py");

        catalog.conn.execute_batch("DROP INDEX idx_files_path;").unwrap();
        catalog
            .conn
            .execute(
                "INSERT INTO files (filename, path, filetype, project_id, size, line_count,
                                    indexed_at, content_hash, is_active)
                 SELECT filename, path, filetype, project_id, size, line_count,
                        indexed_at, content_hash, is_active
                 FROM files WHERE id = ?",
                params![x.id],
            )
            .unwrap();
        let newer_id = catalog.conn.last_insert_rowid();

        catalog.fix(dir.path()).unwrap();
        assert!(catalog.get_file(newer_id).is_ok());
        assert!(catalog.get_file(x.id).is_err());
    }

    #[test]
    fn test_failed_fix_rolls_back_everything() {
        let (dir, mut catalog) = indexed(&[("a/x.py", b"x = 1\n"), ("a/y.py", b"y = 1\n")]);
        let x = record(&catalog, dir.path(), "a/x.py");
        catalog.deactivate_file(x.id).unwrap();
        fs::remove_file(dir.path().join("a/y.py")).unwrap();

        catalog
            .conn
            .execute_batch(
                "CREATE TRIGGER block_delete BEFORE DELETE ON files
                 BEGIN SELECT RAISE(ABORT, 'blocked'); END;",
            )
            .unwrap();

        let err = catalog.fix(dir.path()).unwrap_err();
        assert!(matches!(err, CodexError::Database(_)));

        // The ghost reactivation that ran before the failure was rolled back
        assert!(!catalog.get_file(x.id).unwrap().is_active);
        assert_eq!(catalog.files().unwrap().len(), 2);
    }

    #[test]
    fn test_records_outside_root_are_not_orphaned() {
        let (dir, catalog) = indexed(&[("a/x.py", b"x = 1\n")]);
        let other = TempDir::new().unwrap();

        let analysis = catalog.analyze(other.path()).unwrap();
        assert!(analysis.is_clean(), "{:?}", analysis.issues);
        drop(dir);
    }
}
