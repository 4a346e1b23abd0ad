//! Storage factory for runtime storage selection

use std::sync::Arc;

use crate::config::StorageSettings;
use crate::domain::storage::{Storage, StorageEntity};
use crate::domain::DomainError;

use super::in_memory::InMemoryStorage;
use super::postgres::{PostgresConfig, PostgresStorage};

/// Supported storage types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageType {
    /// In-memory storage (for testing/development)
    InMemory,
    /// PostgreSQL storage
    Postgres,
}

impl StorageType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Some(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            _ => None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// In-memory storage configuration
    InMemory,
    /// PostgreSQL storage configuration
    Postgres(PostgresConfig),
}

impl StorageConfig {
    /// Creates an in-memory storage configuration
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    /// Creates a PostgreSQL configuration from a URL
    pub fn postgres_url(url: impl Into<String>) -> Self {
        Self::Postgres(PostgresConfig::new(url))
    }

    /// Builds the configuration from the `storage` section of the app config
    pub fn from_settings(settings: &StorageSettings) -> Result<Self, DomainError> {
        let storage_type = StorageType::from_str(&settings.backend).ok_or_else(|| {
            DomainError::configuration(format!(
                "Unknown storage backend: {}. Valid backends: memory, postgres",
                settings.backend
            ))
        })?;

        match storage_type {
            StorageType::InMemory => Ok(Self::InMemory),
            StorageType::Postgres => {
                let url = settings.database_url.clone().ok_or_else(|| {
                    DomainError::configuration("database_url is required for postgres storage")
                })?;

                Ok(Self::Postgres(
                    PostgresConfig::new(url).with_max_connections(settings.max_connections),
                ))
            }
        }
    }

    /// Returns the storage type
    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::InMemory => StorageType::InMemory,
            Self::Postgres(_) => StorageType::Postgres,
        }
    }
}

/// Factory for creating storage instances
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Creates a storage instance based on the configuration
    pub async fn create<E>(
        config: &StorageConfig,
        table_name: &str,
    ) -> Result<Arc<dyn Storage<E>>, DomainError>
    where
        E: StorageEntity + 'static,
    {
        match config {
            StorageConfig::InMemory => Ok(Arc::new(InMemoryStorage::<E>::new())),
            StorageConfig::Postgres(pg_config) => {
                let storage = PostgresStorage::<E>::connect(pg_config, table_name).await?;
                storage.ensure_table().await?;
                Ok(Arc::new(storage))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::global::GlobalRecord;

    fn settings(backend: &str, url: Option<&str>) -> StorageSettings {
        StorageSettings {
            backend: backend.to_string(),
            database_url: url.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_storage_type_from_str() {
        assert_eq!(StorageType::from_str("memory"), Some(StorageType::InMemory));
        assert_eq!(StorageType::from_str("in-memory"), Some(StorageType::InMemory));
        assert_eq!(StorageType::from_str("postgresql"), Some(StorageType::Postgres));
        assert_eq!(StorageType::from_str("PG"), Some(StorageType::Postgres));
        assert_eq!(StorageType::from_str("unknown"), None);
    }

    #[test]
    fn test_from_settings() {
        let config = StorageConfig::from_settings(&settings("memory", None)).unwrap();
        assert_eq!(config.storage_type(), StorageType::InMemory);

        let config =
            StorageConfig::from_settings(&settings("postgres", Some("postgres://localhost/x")))
                .unwrap();
        assert_eq!(config.storage_type(), StorageType::Postgres);
    }

    #[test]
    fn test_from_settings_errors() {
        let missing_url = StorageConfig::from_settings(&settings("postgres", None));
        assert!(matches!(missing_url, Err(DomainError::Configuration { .. })));

        let unknown = StorageConfig::from_settings(&settings("sqlite", None));
        assert!(matches!(unknown, Err(DomainError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_create_in_memory() {
        let storage = StorageFactory::create::<GlobalRecord>(&StorageConfig::in_memory(), "unused")
            .await
            .unwrap();

        assert_eq!(storage.count().await.unwrap(), 0);
    }
}
