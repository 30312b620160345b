//! Configuration for codex

use crate::CodexError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory when no config path is given
pub const CONFIG_FILE_NAME: &str = "codex.toml";

/// Default configuration as TOML
pub const DEFAULT_CONFIG: &str = r#"# Codex Configuration

[catalog]
# SQLite database holding files, projects and tags
database = "codex.db"
# Directory scanned when no directory is given on the command line
repository = "."

[indexing]
# Only files with these extensions are indexed
allowed_extensions = [
    ".py", ".js", ".html", ".css", ".cpp", ".c", ".h", ".hpp", ".java", ".php",
    ".rb", ".go", ".rs", ".swift", ".kt", ".scala", ".ino", ".pde", ".json",
    ".xml", ".yaml", ".yml", ".md", ".rst", ".sql", ".sh", ".bat", ".ps1",
    ".dockerfile", ".makefile", ".txt",
]
# Files above this size are skipped ("512KB", "50MB", "1GB" or bytes)
max_file_size = "50MB"
# Processed files per database commit
batch_size = 100
# Honour .gitignore files while walking
respect_gitignore = false

[ignore]
# Directory names never descended into (hidden directories are always pruned)
directories = ["node_modules", "__pycache__", ".git", "dist", "build", "out"]
# Additional glob patterns, matched against paths relative to the scan root
patterns = []

[tags]
# Extra rules appended to the built-in tables
# extensions = { ".vue" = ["vue", "web"] }
# keywords = { "pump" = ["pump", "hardware"] }

[reconcile]
# Apply reconciliation fixes without asking for confirmation
auto_fix = false

[service]
# Maximum number of errors returned by the HTTP index endpoints
max_errors = 10
# Search results per page
per_page = 20
"#;

/// Codex configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub ignore: IgnoreConfig,
    #[serde(default)]
    pub tags: TagsConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default = "default_repository")]
    pub repository: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub respect_gitignore: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgnoreConfig {
    #[serde(default = "default_ignore_directories")]
    pub directories: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Extra tag rules; keys are extensions or filename keywords
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagsConfig {
    #[serde(default)]
    pub extensions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub keywords: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default)]
    pub auto_fix: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

// Default value functions
fn default_database() -> PathBuf {
    PathBuf::from("codex.db")
}
fn default_repository() -> PathBuf {
    PathBuf::from(".")
}
fn default_allowed_extensions() -> Vec<String> {
    [
        ".py", ".js", ".html", ".css", ".cpp", ".c", ".h", ".hpp", ".java", ".php", ".rb", ".go",
        ".rs", ".swift", ".kt", ".scala", ".ino", ".pde", ".json", ".xml", ".yaml", ".yml",
        ".md", ".rst", ".sql", ".sh", ".bat", ".ps1", ".dockerfile", ".makefile", ".txt",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_max_file_size() -> String {
    "50MB".to_string()
}
fn default_batch_size() -> usize {
    100
}
fn default_ignore_directories() -> Vec<String> {
    ["node_modules", "__pycache__", ".git", "dist", "build", "out"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_max_errors() -> usize {
    10
}
fn default_per_page() -> usize {
    20
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            repository: default_repository(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            max_file_size: default_max_file_size(),
            batch_size: default_batch_size(),
            respect_gitignore: false,
        }
    }
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            directories: default_ignore_directories(),
            patterns: Vec::new(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_errors: default_max_errors(),
            per_page: default_per_page(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML string
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| CodexError::ConfigParse(e.to_string()))
    }

    /// Resolve the effective config: explicit file, else `codex.toml` in the
    /// working directory if present, else defaults. Environment overrides last.
    pub fn resolve(path: Option<&Path>) -> crate::Result<Self> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None if Path::new(CONFIG_FILE_NAME).exists() => Self::load(Path::new(CONFIG_FILE_NAME))?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment-style overrides from `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(list) = lookup("ALLOWED_EXTENSIONS") {
            self.indexing.allowed_extensions = split_list(&list);
        }
        if let Some(size) = lookup("MAX_FILE_SIZE") {
            self.indexing.max_file_size = size;
        }
        if let Some(root) = lookup("CODE_REPOSITORY_PATH") {
            self.catalog.repository = PathBuf::from(root);
        }
        if let Some(db) = lookup("CODEX_DATABASE") {
            self.catalog.database = PathBuf::from(db);
        }
        if let Some(dirs) = lookup("CODEX_PRUNE_DIRS") {
            self.ignore.directories = split_list(&dirs);
        }
        if let Some(flag) = lookup("CODEX_AUTO_FIX") {
            self.reconcile.auto_fix = matches!(flag.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    /// Size ceiling in bytes
    pub fn max_file_size_bytes(&self) -> crate::Result<u64> {
        parse_size(&self.indexing.max_file_size)
    }

    /// Write the default config to `path`, refusing to overwrite
    pub fn write_default(path: &Path) -> crate::Result<()> {
        if path.exists() {
            return Err(CodexError::ConfigExists(path.to_path_buf()));
        }
        std::fs::write(path, DEFAULT_CONFIG)?;
        Ok(())
    }
}

/// Parse a human size string ("50MB", "512kb", "1GB", "2048")
pub fn parse_size(s: &str) -> crate::Result<u64> {
    let upper = s.trim().to_uppercase();
    let invalid = || CodexError::InvalidSize(s.to_string());

    let (num, multiplier) = if let Some(n) = upper.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = upper.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix('B') {
        (n, 1)
    } else {
        (upper.as_str(), 1)
    };

    let value: u64 = num.trim().parse().map_err(|_| invalid())?;
    value.checked_mul(multiplier).ok_or_else(invalid)
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_parses() {
        let config = Config::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.indexing.max_file_size, "50MB");
        assert_eq!(config.indexing.batch_size, 100);
        assert!(config.indexing.allowed_extensions.contains(&".py".to_string()));
        assert!(config.ignore.directories.contains(&"node_modules".to_string()));
        assert_eq!(config.service.max_errors, 10);
        assert!(!config.reconcile.auto_fix);
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("50MB").unwrap(), 50 * 1024 * 1024);
        assert_eq!(parse_size("512kb").unwrap(), 512 * 1024);
        assert_eq!(parse_size(" 1GB ").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("2048").unwrap(), 2048);
        assert_eq!(parse_size("10B").unwrap(), 10);
        assert!(matches!(parse_size("lots"), Err(CodexError::InvalidSize(_))));
        assert!(parse_size("MB").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("ALLOWED_EXTENSIONS", ".py, .rs,,"),
            ("MAX_FILE_SIZE", "1KB"),
            ("CODE_REPOSITORY_PATH", "/srv/code"),
            ("CODEX_PRUNE_DIRS", "target,vendor"),
            ("CODEX_AUTO_FIX", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.indexing.allowed_extensions, vec![".py", ".rs"]);
        assert_eq!(config.max_file_size_bytes().unwrap(), 1024);
        assert_eq!(config.catalog.repository, PathBuf::from("/srv/code"));
        assert_eq!(config.ignore.directories, vec!["target", "vendor"]);
        assert!(config.reconcile.auto_fix);
        assert_eq!(config.catalog.database, PathBuf::from("codex.db"));
    }

    #[test]
    fn test_tag_rules_from_toml() {
        let config = Config::from_toml(
            r#"
            [tags]
            extensions = { ".vue" = ["vue", "web"] }
            keywords = { "pump" = ["pump", "hardware"] }
            "#,
        )
        .unwrap();
        assert_eq!(config.tags.extensions[".vue"], vec!["vue", "web"]);
        assert_eq!(config.tags.keywords["pump"], vec!["pump", "hardware"]);
        assert_eq!(config.indexing.batch_size, 100);
    }
}
