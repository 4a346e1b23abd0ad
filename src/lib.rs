//! System globals
//!
//! Named configuration values persisted in a table and served from a single
//! cached snapshot:
//! - Values stored as text, coerced to float, integer, boolean or string on read
//! - Prefix projections of the whole table (`as_dict`)
//! - Writes that update the cached snapshot in place instead of invalidating it
//! - In-memory or PostgreSQL storage, in-memory or Redis cache

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{DictOptions, DomainError, GlobalFilter, GlobalPatch, GlobalRecord, GlobalValue};
pub use infrastructure::globals::GlobalRegistry;

use infrastructure::cache::CacheFactory;
use infrastructure::storage::{StorageConfig, StorageFactory};
use tracing::info;

/// Create a registry with the default configuration
pub async fn create_registry() -> anyhow::Result<GlobalRegistry> {
    create_registry_with_config(&AppConfig::default()).await
}

/// Create a registry wired to the storage and cache selected by `config`
pub async fn create_registry_with_config(config: &AppConfig) -> anyhow::Result<GlobalRegistry> {
    let storage_config = StorageConfig::from_settings(&config.storage)?;
    info!(backend = ?storage_config.storage_type(), "Opening system globals storage");
    let storage =
        StorageFactory::create::<GlobalRecord>(&storage_config, &config.storage.table_name).await?;

    info!(backend = %config.cache.backend, "Opening system globals cache");
    let cache = CacheFactory::new().create(&config.cache).await?;

    Ok(GlobalRegistry::from_settings(storage, cache, &config.cache))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_registry_in_memory() {
        let registry = create_registry().await.unwrap();

        registry.set("site_name", "Example").await.unwrap();

        assert_eq!(
            registry.get_value("site_name").await.unwrap(),
            GlobalValue::String("Example".to_string())
        );
        assert_eq!(registry.snapshot_key(), "SystemGlobals");
    }

    #[tokio::test]
    async fn test_create_registry_rejects_unknown_backend() {
        let mut config = AppConfig::default();
        config.storage.backend = "sqlite".to_string();

        assert!(create_registry_with_config(&config).await.is_err());
    }
}
