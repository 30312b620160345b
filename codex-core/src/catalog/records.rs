//! Row types and connection-level helpers shared by the indexer and reconciler.
//!
//! Helpers take `&Connection` so they run unchanged inside transactions and
//! savepoints (both deref to `Connection`).

use crate::scan::FileInfo;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

/// Shared column list for file queries, matches the `file_from_row` column order.
pub(crate) const FILE_SELECT: &str = "f.id, f.filename, f.path, f.filetype, f.project_id, \
     f.description, f.size, f.line_count, f.modified_at, f.indexed_at, f.content_hash, f.is_active";

/// A catalogued file. `path` is absolute and unique.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub id: i64,
    pub filename: String,
    pub path: String,
    pub filetype: String,
    pub project_id: Option<i64>,
    pub description: Option<String>,
    pub size: u64,
    pub line_count: u64,
    pub modified_at: Option<i64>,
    pub indexed_at: i64,
    pub content_hash: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
}

/// Fields for a first-time insert
pub(crate) struct NewFile<'a> {
    pub filename: &'a str,
    pub path: &'a str,
    pub filetype: &'a str,
    pub project_id: i64,
    pub description: String,
    pub info: &'a FileInfo,
}

pub(crate) fn file_from_row(row: &rusqlite::Row) -> rusqlite::Result<FileRecord> {
    let size: i64 = row.get(6)?;
    let line_count: i64 = row.get(7)?;
    Ok(FileRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        path: row.get(2)?,
        filetype: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        project_id: row.get(4)?,
        description: row.get(5)?,
        size: size.max(0) as u64,
        line_count: line_count.max(0) as u64,
        modified_at: row.get(8)?,
        indexed_at: row.get(9)?,
        content_hash: row.get(10)?,
        is_active: row.get(11)?,
    })
}

pub(crate) fn project_from_row(row: &rusqlite::Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
        is_active: row.get(4)?,
    })
}

pub(crate) fn tag_from_row(row: &rusqlite::Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Most recently indexed record for `path`, active or not
pub(crate) fn find_file_by_path(conn: &Connection, path: &str) -> rusqlite::Result<Option<FileRecord>> {
    conn.query_row(
        &format!(
            "SELECT {FILE_SELECT} FROM files f
             WHERE f.path = ?
             ORDER BY f.indexed_at DESC, f.id DESC
             LIMIT 1"
        ),
        params![path],
        file_from_row,
    )
    .optional()
}

pub(crate) fn find_file_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<FileRecord>> {
    conn.query_row(
        &format!("SELECT {FILE_SELECT} FROM files f WHERE f.id = ?"),
        params![id],
        file_from_row,
    )
    .optional()
}

pub(crate) fn all_files(conn: &Connection) -> rusqlite::Result<Vec<FileRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {FILE_SELECT} FROM files f ORDER BY f.id"))?;
    let rows = stmt.query_map([], file_from_row)?;
    rows.collect()
}

pub(crate) fn insert_file(conn: &Connection, file: &NewFile<'_>, now: i64) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO files (filename, path, filetype, project_id, description, size,
                            line_count, modified_at, indexed_at, content_hash, is_active)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
        params![
            file.filename,
            file.path,
            file.filetype,
            file.project_id,
            file.description,
            file.info.size as i64,
            file.info.line_count as i64,
            file.info.modified_at,
            now,
            file.info.content_hash,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Refresh metadata of an active record after a content change
pub(crate) fn update_file_info(conn: &Connection, id: i64, info: &FileInfo, now: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE files
         SET size = ?, line_count = ?, modified_at = ?, content_hash = ?, indexed_at = ?
         WHERE id = ?",
        params![
            info.size as i64,
            info.line_count as i64,
            info.modified_at,
            info.content_hash,
            now,
            id
        ],
    )
}

/// Reactivate an inactive record with fresh metadata, optionally moving it to `project_id`
pub(crate) fn reactivate_file(
    conn: &Connection,
    id: i64,
    info: &FileInfo,
    project_id: Option<i64>,
    now: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE files
         SET is_active = 1, size = ?, line_count = ?, modified_at = ?, content_hash = ?,
             indexed_at = ?, project_id = COALESCE(?, project_id)
         WHERE id = ?",
        params![
            info.size as i64,
            info.line_count as i64,
            info.modified_at,
            info.content_hash,
            now,
            project_id,
            id
        ],
    )
}

pub(crate) fn set_active(conn: &Connection, id: i64, active: bool) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE files SET is_active = ? WHERE id = ?",
        params![active, id],
    )
}

pub(crate) fn set_content_hash(conn: &Connection, id: i64, hash: &str, now: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE files SET content_hash = ?, indexed_at = ? WHERE id = ?",
        params![hash, now, id],
    )
}

/// Hard delete; tag links cascade
pub(crate) fn delete_file(conn: &Connection, id: i64) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM files WHERE id = ?", params![id])
}

pub(crate) fn project_exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?)",
        params![id],
        |row| row.get(0),
    )
}

pub(crate) fn get_or_create_project(conn: &Connection, name: &str, now: i64) -> rusqlite::Result<i64> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM projects WHERE name = ?", params![name], |row| row.get(0))
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO projects (name, description, created_at, is_active) VALUES (?, ?, ?, 1)",
        params![name, format!("Auto-created project for {}", name), now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn get_or_create_tag(conn: &Connection, name: &str, now: i64) -> rusqlite::Result<i64> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM tags WHERE name = ?", params![name], |row| row.get(0))
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO tags (name, description, created_at) VALUES (?, 'Auto-generated tag', ?)",
        params![name, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn attach_tag(conn: &Connection, file_id: i64, tag_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO file_tags (file_id, tag_id) VALUES (?, ?)",
        params![file_id, tag_id],
    )?;
    Ok(())
}

pub(crate) fn tags_for_file(conn: &Connection, file_id: i64) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name FROM file_tags ft
         JOIN tags t ON t.id = ft.tag_id
         WHERE ft.file_id = ?
         ORDER BY t.name",
    )?;
    let rows = stmt.query_map(params![file_id], |row| row.get(0))?;
    rows.collect()
}
