//! Substring search over active files

use super::{tags_for_file, Catalog};
use crate::error::CodexError;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// Search request. Matches filename, description or tag name, case-insensitively.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    /// Project name filter
    #[serde(default)]
    pub project: Option<String>,
    /// Extension filter, e.g. ".py"
    #[serde(default)]
    pub filetype: Option<String>,
    /// 1-based page number
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub per_page: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub id: i64,
    pub filename: String,
    pub path: String,
    pub filetype: String,
    pub description: Option<String>,
    pub size: u64,
    pub line_count: u64,
    pub modified_at: Option<i64>,
    pub project: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchPage {
    pub results: Vec<SearchHit>,
    pub total: usize,
    pub page: usize,
    pub pages: usize,
    pub per_page: usize,
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl Catalog {
    pub fn search(&self, query: &SearchQuery) -> crate::Result<SearchPage> {
        let text = query.text.trim();
        if text.is_empty() {
            return Err(CodexError::InvalidQuery(
                "search text is required".to_string(),
            ));
        }

        let per_page = query
            .per_page
            .unwrap_or(self.config.service.per_page)
            .max(1);
        let page = query.page.unwrap_or(1).max(1);

        let mut conditions = vec![
            "f.is_active = 1".to_string(),
            "(f.filename LIKE ?1 ESCAPE '\\' OR f.description LIKE ?1 ESCAPE '\\' \
             OR f.id IN (SELECT ft.file_id FROM file_tags ft JOIN tags t ON t.id = ft.tag_id \
                         WHERE t.name LIKE ?1 ESCAPE '\\'))"
                .to_string(),
        ];
        let mut values: Vec<Value> = vec![Value::Text(escape_like(text))];

        if let Some(project) = query.project.as_deref().filter(|p| !p.is_empty()) {
            values.push(Value::Text(project.to_string()));
            conditions.push(format!("p.name = ?{}", values.len()));
        }
        if let Some(filetype) = query.filetype.as_deref().filter(|t| !t.is_empty()) {
            let filetype = filetype.to_lowercase();
            let filetype = if filetype.starts_with('.') {
                filetype
            } else {
                format!(".{}", filetype)
            };
            values.push(Value::Text(filetype));
            conditions.push(format!("f.filetype = ?{}", values.len()));
        }

        let from_where = format!(
            "FROM files f LEFT JOIN projects p ON p.id = f.project_id WHERE {}",
            conditions.join(" AND ")
        );

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) {from_where}"),
            rusqlite::params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        let total = total as usize;

        values.push(Value::Integer(per_page as i64));
        let limit_idx = values.len();
        values.push(Value::Integer(((page - 1) * per_page) as i64));
        let offset_idx = values.len();

        let sql = format!(
            "SELECT f.id, f.filename, f.path, f.filetype, f.description, f.size, f.line_count,
                    f.modified_at, p.name
             {from_where}
             ORDER BY f.filename, f.id
             LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(values.iter()), |row| {
            let size: i64 = row.get(5)?;
            let line_count: i64 = row.get(6)?;
            Ok(SearchHit {
                id: row.get(0)?,
                filename: row.get(1)?,
                path: row.get(2)?,
                filetype: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                description: row.get(4)?,
                size: size.max(0) as u64,
                line_count: line_count.max(0) as u64,
                modified_at: row.get(7)?,
                project: row.get(8)?,
                tags: Vec::new(),
            })
        })?;

        let mut results = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        for hit in &mut results {
            hit.tags = tags_for_file(&self.conn, hit.id)?;
        }

        Ok(SearchPage {
            results,
            total,
            page,
            pages: total.div_ceil(per_page),
            per_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("motor"), "%motor%");
        assert_eq!(escape_like("50%_a\\b"), "%50\\%\\_a\\\\b%");
    }

    #[test]
    fn test_empty_query_is_rejected() {
        let catalog = Catalog::open_in_memory(Default::default()).unwrap();
        let err = catalog
            .search(&SearchQuery {
                text: "   ".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, CodexError::InvalidQuery(_)));
    }
}
