//! SQLite catalog of files, projects and tags

mod records;
mod search;

pub use records::{FileRecord, Project, Tag};
pub use search::{SearchHit, SearchPage, SearchQuery};

pub(crate) use records::*;

use crate::config::Config;
use crate::error::CodexError;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const SCHEMA_VERSION: i32 = 1;

/// Catalog totals
#[derive(Debug, Serialize)]
pub struct CatalogStats {
    pub projects: usize,
    pub tags: usize,
    pub files_total: usize,
    pub files_active: usize,
    pub files_inactive: usize,
    /// Sum of active file sizes in bytes
    pub total_size: u64,
    /// Active file counts keyed by extension
    pub by_type: BTreeMap<String, usize>,
    pub last_indexed: Option<String>,
    pub database_size_bytes: u64,
    pub schema_version: i32,
}

/// Handle to the catalog database
pub struct Catalog {
    pub(crate) conn: Connection,
    pub(crate) config: Config,
    db_path: Option<PathBuf>,
}

impl Catalog {
    /// Open (or create) the catalog at `db_path`
    pub fn open(db_path: &Path, config: Config) -> crate::Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn,
            config,
            db_path: Some(db_path.to_path_buf()),
        })
    }

    pub fn open_in_memory(config: Config) -> crate::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn,
            config,
            db_path: None,
        })
    }

    fn init_schema(conn: &Connection) -> crate::Result<()> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version != 0 && version != SCHEMA_VERSION {
            return Err(CodexError::SchemaVersionMismatch {
                found: version,
                expected: SCHEMA_VERSION,
            });
        }

        if version == 0 {
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS projects (
                    id INTEGER PRIMARY KEY,
                    name TEXT UNIQUE NOT NULL,
                    description TEXT,
                    created_at INTEGER NOT NULL,
                    is_active INTEGER NOT NULL DEFAULT 1
                );

                CREATE TABLE IF NOT EXISTS tags (
                    id INTEGER PRIMARY KEY,
                    name TEXT UNIQUE NOT NULL,
                    description TEXT,
                    created_at INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS files (
                    id INTEGER PRIMARY KEY,
                    filename TEXT NOT NULL,
                    path TEXT NOT NULL,
                    filetype TEXT,
                    project_id INTEGER REFERENCES projects(id),
                    description TEXT,
                    size INTEGER NOT NULL DEFAULT 0,
                    line_count INTEGER NOT NULL DEFAULT 0,
                    modified_at INTEGER,
                    indexed_at INTEGER NOT NULL,
                    content_hash TEXT,
                    is_active INTEGER NOT NULL DEFAULT 1
                );

                -- One record per path
                CREATE UNIQUE INDEX IF NOT EXISTS idx_files_path ON files(path);
                CREATE INDEX IF NOT EXISTS idx_files_project ON files(project_id);
                CREATE INDEX IF NOT EXISTS idx_files_active ON files(is_active);

                CREATE TABLE IF NOT EXISTS file_tags (
                    file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
                    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                    PRIMARY KEY (file_id, tag_id)
                );
                CREATE INDEX IF NOT EXISTS idx_file_tags_tag ON file_tags(tag_id);

                PRAGMA user_version = 1;
                ",
            )?;
        }

        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Catalog totals and per-extension breakdown
    pub fn stats(&self) -> crate::Result<CatalogStats> {
        let count = |sql: &str| -> crate::Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        let projects = count("SELECT COUNT(*) FROM projects")?;
        let tags = count("SELECT COUNT(*) FROM tags")?;
        let files_total = count("SELECT COUNT(*) FROM files")?;
        let files_active = count("SELECT COUNT(*) FROM files WHERE is_active = 1")?;

        let total_size: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(size), 0) FROM files WHERE is_active = 1",
            [],
            |row| row.get(0),
        )?;

        let mut by_type = BTreeMap::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT COALESCE(filetype, ''), COUNT(*) FROM files
                 WHERE is_active = 1
                 GROUP BY filetype",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (filetype, n) = row?;
                by_type.insert(filetype, n as usize);
            }
        }

        let last_indexed: Option<i64> =
            self.conn
                .query_row("SELECT MAX(indexed_at) FROM files", [], |row| row.get(0))?;

        let database_size_bytes = self
            .db_path
            .as_ref()
            .and_then(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(CatalogStats {
            projects,
            tags,
            files_total,
            files_active,
            files_inactive: files_total - files_active,
            total_size: total_size.max(0) as u64,
            by_type,
            last_indexed: last_indexed.map(format_timestamp),
            database_size_bytes,
            schema_version: SCHEMA_VERSION,
        })
    }

    pub fn get_file(&self, id: i64) -> crate::Result<FileRecord> {
        find_file_by_id(&self.conn, id)?.ok_or(CodexError::RecordNotFound { kind: "File", id })
    }

    /// Most recently indexed record for an absolute path
    pub fn file_by_path(&self, path: &str) -> crate::Result<Option<FileRecord>> {
        Ok(find_file_by_path(&self.conn, path)?)
    }

    pub fn files(&self) -> crate::Result<Vec<FileRecord>> {
        Ok(all_files(&self.conn)?)
    }

    pub fn file_tags(&self, file_id: i64) -> crate::Result<Vec<String>> {
        Ok(tags_for_file(&self.conn, file_id)?)
    }

    /// Soft delete: the record stays and can be resurrected by a later index run
    pub fn deactivate_file(&self, id: i64) -> crate::Result<FileRecord> {
        if set_active(&self.conn, id, false)? == 0 {
            return Err(CodexError::RecordNotFound { kind: "File", id });
        }
        self.get_file(id)
    }

    /// Hard delete every inactive record, returning how many were removed
    pub fn purge_inactive(&mut self) -> crate::Result<usize> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute("DELETE FROM files WHERE is_active = 0", [])?;
        tx.commit()?;
        tracing::info!(removed, "purged inactive file records");
        Ok(removed)
    }

    pub fn list_projects(&self) -> crate::Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, created_at, is_active FROM projects ORDER BY name",
        )?;
        let rows = stmt.query_map([], project_from_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn get_project(&self, id: i64) -> crate::Result<Project> {
        self.conn
            .query_row(
                "SELECT id, name, description, created_at, is_active FROM projects WHERE id = ?",
                params![id],
                project_from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => CodexError::ProjectNotFound(id),
                other => other.into(),
            })
    }

    pub fn create_project(&self, name: &str, description: Option<&str>) -> crate::Result<Project> {
        let name = name.trim();
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE name = ?)",
            params![name],
            |row| row.get(0),
        )?;
        if exists {
            return Err(CodexError::AlreadyExists {
                kind: "Project",
                name: name.to_string(),
            });
        }

        self.conn.execute(
            "INSERT INTO projects (name, description, created_at, is_active) VALUES (?, ?, ?, 1)",
            params![name, description, now_ts()],
        )?;
        self.get_project(self.conn.last_insert_rowid())
    }

    pub fn list_tags(&self) -> crate::Result<Vec<Tag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description, created_at FROM tags ORDER BY name")?;
        let rows = stmt.query_map([], tag_from_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn create_tag(&self, name: &str, description: Option<&str>) -> crate::Result<Tag> {
        let name = name.trim().to_lowercase();
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tags WHERE name = ?)",
            params![name],
            |row| row.get(0),
        )?;
        if exists {
            return Err(CodexError::AlreadyExists { kind: "Tag", name });
        }

        self.conn.execute(
            "INSERT INTO tags (name, description, created_at) VALUES (?, ?, ?)",
            params![name, description, now_ts()],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(self.conn.query_row(
            "SELECT id, name, description, created_at FROM tags WHERE id = ?",
            params![id],
            tag_from_row,
        )?)
    }
}

/// Current unix time in seconds
pub(crate) fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// RFC 3339 rendering of a stored unix timestamp
pub fn format_timestamp(ts: i64) -> String {
    OffsetDateTime::from_unix_timestamp(ts)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_schema_and_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("nested").join("codex.db");
        let catalog = Catalog::open(&db, Config::default()).unwrap();

        let stats = catalog.stats().unwrap();
        assert_eq!(stats.files_total, 0);
        assert_eq!(stats.schema_version, SCHEMA_VERSION);
        assert!(db.exists());

        // Reopening an existing catalog is fine
        drop(catalog);
        Catalog::open(&db, Config::default()).unwrap();
    }

    #[test]
    fn test_schema_version_mismatch_fails_fast() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("codex.db");
        {
            let conn = Connection::open(&db).unwrap();
            conn.execute_batch("PRAGMA user_version = 7;").unwrap();
        }

        let err = Catalog::open(&db, Config::default()).err().unwrap();
        assert!(matches!(
            err,
            CodexError::SchemaVersionMismatch { found: 7, expected: 1 }
        ));
    }

    #[test]
    fn test_create_project_rejects_duplicates() {
        let catalog = Catalog::open_in_memory(Config::default()).unwrap();
        let project = catalog.create_project("robot", Some("arm firmware")).unwrap();
        assert_eq!(project.name, "robot");
        assert!(project.is_active);

        let err = catalog.create_project("robot", None).unwrap_err();
        assert!(matches!(err, CodexError::AlreadyExists { kind: "Project", .. }));
        assert_eq!(catalog.list_projects().unwrap().len(), 1);
    }

    #[test]
    fn test_create_tag_normalizes_name() {
        let catalog = Catalog::open_in_memory(Config::default()).unwrap();
        let tag = catalog.create_tag("  Firmware ", None).unwrap();
        assert_eq!(tag.name, "firmware");
        assert!(catalog.create_tag("FIRMWARE", None).is_err());
    }

    #[test]
    fn test_unknown_records() {
        let catalog = Catalog::open_in_memory(Config::default()).unwrap();
        assert!(matches!(
            catalog.get_project(42),
            Err(CodexError::ProjectNotFound(42))
        ));
        assert!(matches!(
            catalog.deactivate_file(42),
            Err(CodexError::RecordNotFound { kind: "File", id: 42 })
        ));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00Z");
    }
}
