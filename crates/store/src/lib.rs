//! Record store implementations for ForkReach.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(test)]
mod conformance;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use forkreach_config::{StoreBackend, StoreConfig};
use forkreach_core::error::StoreError;
use forkreach_core::store::RecordStore;
use tracing::info;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Open the store selected by configuration.
pub async fn build_from_config(config: &StoreConfig) -> Result<Arc<dyn RecordStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory record store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        #[cfg(feature = "sqlite")]
        StoreBackend::Sqlite => {
            let path = config.resolved_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Storage(format!("Cannot create {}: {e}", parent.display()))
                })?;
            }
            Ok(Arc::new(SqliteStore::open(&path).await?))
        }
        #[cfg(not(feature = "sqlite"))]
        StoreBackend::Sqlite => Err(StoreError::Storage(
            "SQLite support not compiled in; set store.backend = \"memory\"".into(),
        )),
    }
}

/// Strictly increasing timestamps, so `updated_at` ordering never ties
/// between writes that land within the clock's resolution.
#[derive(Debug)]
pub(crate) struct MonotonicClock {
    last: Mutex<DateTime<Utc>>,
}

impl MonotonicClock {
    pub(crate) fn new() -> Self {
        Self {
            last: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now().max(*last + Duration::microseconds(1));
        *last = now;
        now
    }
}
