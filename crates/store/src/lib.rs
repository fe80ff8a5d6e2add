//! Persistence backends for Reagent transcripts and run records.

pub mod in_memory;
pub mod schemas;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use schemas::{record_schemas, run_output_schema, verify_record_schemas};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[cfg(feature = "sqlite")]
use reagent_config::AppConfig;
#[cfg(feature = "sqlite")]
use reagent_core::error::StoreError;

/// Open the configured SQLite store, or `None` when persistence is disabled.
///
/// The parent directory of a file-backed database is created if needed.
#[cfg(feature = "sqlite")]
pub async fn open_from_config(config: &AppConfig) -> Result<Option<SqliteStore>, StoreError> {
    if config.database.is_disabled() {
        return Ok(None);
    }

    let url = config.database.resolved_url();
    if let Some(parent) = sqlite::file_path(&url).and_then(|p| p.parent().map(|p| p.to_path_buf()))
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(&parent).map_err(|e| {
            StoreError::Storage(format!("Cannot create {}: {e}", parent.display()))
        })?;
    }

    let store = SqliteStore::new(&url, config.database.pool_size, config.tables()).await?;
    Ok(Some(store))
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use reagent_core::store::RunStore;

    #[tokio::test]
    async fn disabled_database_opens_nothing() {
        let mut config = AppConfig::default();
        config.database.url = "none".into();
        assert!(open_from_config(&config).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_database_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("reagent.db");
        let mut config = AppConfig::default();
        config.database.url = format!("sqlite://{}", db.display());

        let store = open_from_config(&config).await.unwrap().unwrap();
        assert!(store.recent(5).await.unwrap().is_empty());
        assert!(db.exists());
    }
}
