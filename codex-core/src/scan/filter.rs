//! Eligibility filter: decides whether a file is indexed at all.

use crate::config::Config;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Non-text MIME types that are still acceptable catalog content
const TEXTUAL_APPLICATION_MIMES: &[&str] = &[
    "application/javascript",
    "application/json",
    "application/xml",
    "application/sql",
];

/// Why a file was not indexed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Hidden,
    TooLarge { size: u64, limit: u64 },
    ExtensionNotAllowed(String),
    BinaryMime(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hidden => write!(f, "hidden file"),
            Self::TooLarge { size, limit } => write!(f, "{} bytes exceeds limit of {}", size, limit),
            Self::ExtensionNotAllowed(ext) if ext.is_empty() => write!(f, "no extension"),
            Self::ExtensionNotAllowed(ext) => write!(f, "extension {} not allowed", ext),
            Self::BinaryMime(mime) => write!(f, "binary MIME type {}", mime),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    allowed_extensions: HashSet<String>,
    max_file_size: u64,
}

impl EligibilityFilter {
    pub fn new<I, S>(allowed_extensions: I, max_file_size: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .filter(|ext| ext.len() > 1)
                .collect(),
            max_file_size,
        }
    }

    pub fn from_config(config: &Config) -> crate::Result<Self> {
        Ok(Self::new(
            &config.indexing.allowed_extensions,
            config.max_file_size_bytes()?,
        ))
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Check a file with a known size. `Ok(())` means index it.
    pub fn evaluate(&self, path: &Path, size: u64) -> Result<(), SkipReason> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if name.starts_with('.') {
            return Err(SkipReason::Hidden);
        }

        if size > self.max_file_size {
            return Err(SkipReason::TooLarge {
                size,
                limit: self.max_file_size,
            });
        }

        let ext = file_extension(path);
        let explicitly_allowed = self.allowed_extensions.contains(&ext);
        if !self.allowed_extensions.is_empty() && !explicitly_allowed {
            return Err(SkipReason::ExtensionNotAllowed(ext));
        }

        if let Some(mime) = mime_guess::from_path(path).first() {
            let essence = mime.essence_str();
            let textual = mime.type_() == mime_guess::mime::TEXT
                || TEXTUAL_APPLICATION_MIMES.contains(&essence);
            if !textual && !explicitly_allowed {
                return Err(SkipReason::BinaryMime(essence.to_string()));
            }
        }

        Ok(())
    }

    /// Predicate form of [`evaluate`](Self::evaluate), reading the size from disk
    pub fn should_index(&self, path: &Path) -> bool {
        match std::fs::metadata(path) {
            Ok(meta) => meta.is_file() && self.evaluate(path, meta.len()).is_ok(),
            Err(_) => false,
        }
    }
}

/// Lowercased extension with a leading dot, or "" when there is none
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn filter() -> EligibilityFilter {
        EligibilityFilter::new([".py", "RS", ".json"], 100)
    }

    #[test]
    fn test_hidden_files_rejected() {
        assert_eq!(
            filter().evaluate(Path::new("/repo/.secret.py"), 1),
            Err(SkipReason::Hidden)
        );
    }

    #[test]
    fn test_extension_allow_list_is_case_insensitive() {
        let f = filter();
        assert!(f.evaluate(Path::new("/repo/main.PY"), 10).is_ok());
        assert!(f.evaluate(Path::new("/repo/lib.rs"), 10).is_ok());
        assert_eq!(
            f.evaluate(Path::new("/repo/blob.bin"), 10),
            Err(SkipReason::ExtensionNotAllowed(".bin".to_string()))
        );
        assert_eq!(
            f.evaluate(Path::new("/repo/Makefile"), 10),
            Err(SkipReason::ExtensionNotAllowed(String::new()))
        );
    }

    #[test]
    fn test_size_ceiling_boundary() {
        let f = filter();
        assert!(f.evaluate(Path::new("/repo/a.py"), 99).is_ok());
        assert!(f.evaluate(Path::new("/repo/a.py"), 100).is_ok());
        assert_eq!(
            f.evaluate(Path::new("/repo/a.py"), 101),
            Err(SkipReason::TooLarge {
                size: 101,
                limit: 100
            })
        );
    }

    #[test]
    fn test_binary_mime_rejected_without_allow_list() {
        let f = EligibilityFilter::new(Vec::<String>::new(), 1_000);
        assert!(f.evaluate(Path::new("/repo/notes.txt"), 1).is_ok());
        assert!(f.evaluate(Path::new("/repo/data.json"), 1).is_ok());
        assert!(f.evaluate(Path::new("/repo/README"), 1).is_ok());
        assert!(matches!(
            f.evaluate(Path::new("/repo/photo.png"), 1),
            Err(SkipReason::BinaryMime(_))
        ));
    }

    #[test]
    fn test_explicitly_allowed_extension_overrides_mime() {
        // .ts may guess as a video type; an explicit allow wins
        let f = EligibilityFilter::new([".ts"], 1_000);
        assert!(f.evaluate(Path::new("/repo/app.ts"), 1).is_ok());
    }

    #[test]
    fn test_should_index_reads_size_from_disk() {
        let dir = TempDir::new().unwrap();
        let under = dir.path().join("under.py");
        let over = dir.path().join("over.py");
        fs::write(&under, vec![b'x'; 99]).unwrap();
        fs::write(&over, vec![b'x'; 101]).unwrap();

        let f = filter();
        assert!(f.should_index(&under));
        assert!(!f.should_index(&over));
        assert!(!f.should_index(&dir.path().join("missing.py")));
    }
}
