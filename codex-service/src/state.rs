use codex_core::{Catalog, CodexError};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    /// Held for the whole of each catalog request, inside `spawn_blocking`
    catalog: Mutex<Catalog>,
    pub started_at: i64,
}

impl AppState {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            started_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0),
        }
    }

    pub fn catalog(&self) -> Result<MutexGuard<'_, Catalog>, CodexError> {
        self.catalog.lock().map_err(|err| {
            CodexError::Io(io::Error::other(format!("Catalog mutex poisoned: {err}")))
        })
    }
}
