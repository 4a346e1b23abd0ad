//! PostgreSQL storage implementation with connection pooling

use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::debug;

use crate::domain::storage::{EntityFilter, EntityPatch, Storage, StorageEntity, StorageKey};
use crate::domain::DomainError;

/// PostgreSQL storage configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/system_globals".to_string(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 30,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }
}

/// PostgreSQL storage implementation with connection pooling
///
/// Stores entities as JSON in a table with (key, data) columns; the primary
/// key on `key` is the uniqueness constraint `create` relies on.
pub struct PostgresStorage<E>
where
    E: StorageEntity,
{
    pool: PgPool,
    table_name: String,
    _phantom: PhantomData<E>,
}

impl<E> Debug for PostgresStorage<E>
where
    E: StorageEntity,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStorage")
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl<E> PostgresStorage<E>
where
    E: StorageEntity,
{
    /// Creates a new PostgreSQL storage with the given pool and table name
    pub fn new(pool: PgPool, table_name: impl Into<String>) -> Self {
        Self {
            pool,
            table_name: table_name.into(),
            _phantom: PhantomData,
        }
    }

    /// Creates a new PostgreSQL storage with connection pooling
    pub async fn connect(
        config: &PostgresConfig,
        table_name: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))?;

        Ok(Self::new(pool, table_name))
    }

    /// Ensures the storage table exists
    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        let query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                key VARCHAR(255) PRIMARY KEY,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.table_name
        );

        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to create table: {}", e)))?;

        Ok(())
    }

    fn decode(row: &PgRow) -> Result<E, DomainError> {
        let data: serde_json::Value = row.get("data");
        serde_json::from_value(data)
            .map_err(|e| DomainError::storage(format!("Failed to deserialize entity: {}", e)))
    }

    fn encode(entity: &E) -> Result<serde_json::Value, DomainError> {
        serde_json::to_value(entity)
            .map_err(|e| DomainError::storage(format!("Failed to serialize entity: {}", e)))
    }
}

#[async_trait]
impl<E> Storage<E> for PostgresStorage<E>
where
    E: StorageEntity + 'static,
{
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError> {
        let query = format!("SELECT data FROM {} WHERE key = $1", self.table_name);
        debug!(table = %self.table_name, key = key.as_str(), "postgres get");

        let result = sqlx::query(&query)
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get entity: {}", e)))?;

        result.as_ref().map(Self::decode).transpose()
    }

    async fn list(&self) -> Result<Vec<E>, DomainError> {
        let query = format!("SELECT data FROM {} ORDER BY created_at", self.table_name);
        debug!(table = %self.table_name, "postgres list");

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list entities: {}", e)))?;

        rows.iter().map(Self::decode).collect()
    }

    async fn create(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let data = Self::encode(&entity)?;

        let query = format!(
            r#"
            INSERT INTO {} (key, data)
            VALUES ($1, $2)
            "#,
            self.table_name
        );

        sqlx::query(&query)
            .bind(&key)
            .bind(&data)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                let unique_violation = e
                    .as_database_error()
                    .is_some_and(|db| db.is_unique_violation());

                if unique_violation {
                    DomainError::conflict(format!("Entity with key '{}' already exists", key))
                } else {
                    DomainError::storage(format!("Failed to create entity: {}", e))
                }
            })?;

        Ok(entity)
    }

    async fn update(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let data = Self::encode(&entity)?;

        let query = format!(
            r#"
            UPDATE {}
            SET data = $2, updated_at = NOW()
            WHERE key = $1
            "#,
            self.table_name
        );

        let result = sqlx::query(&query)
            .bind(&key)
            .bind(&data)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to update entity: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Entity with key '{}' not found",
                key
            )));
        }

        Ok(entity)
    }

    async fn update_where(
        &self,
        filter: &dyn EntityFilter<E>,
        patch: &dyn EntityPatch<E>,
    ) -> Result<Vec<E>, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        let update = format!(
            "UPDATE {} SET data = $2, updated_at = NOW() WHERE key = $1",
            self.table_name
        );

        // Row locks keep concurrent writers out until the commit; a keyed
        // filter locks only its own row
        let rows = match filter.key_hint() {
            Some(key) => {
                let select = format!(
                    "SELECT key, data FROM {} WHERE key = $1 FOR UPDATE",
                    self.table_name
                );
                sqlx::query(&select).bind(key).fetch_all(&mut *tx).await
            }
            None => {
                let select = format!("SELECT key, data FROM {} FOR UPDATE", self.table_name);
                sqlx::query(&select).fetch_all(&mut *tx).await
            }
        }
        .map_err(|e| DomainError::storage(format!("Failed to select entities: {}", e)))?;

        let mut updated = Vec::new();

        for row in &rows {
            let mut entity = Self::decode(row)?;

            if !filter.matches(&entity) {
                continue;
            }

            patch.apply(&mut entity);
            let key: String = row.get("key");
            let data = Self::encode(&entity)?;

            sqlx::query(&update)
                .bind(&key)
                .bind(&data)
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to update entity: {}", e)))?;

            updated.push(entity);
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit transaction: {}", e)))?;

        debug!(table = %self.table_name, rows = updated.len(), "postgres update_where");
        Ok(updated)
    }

    async fn delete(&self, key: &E::Key) -> Result<bool, DomainError> {
        let query = format!("DELETE FROM {} WHERE key = $1", self.table_name);

        let result = sqlx::query(&query)
            .bind(key.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete entity: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> Result<(), DomainError> {
        let query = format!("DELETE FROM {}", self.table_name);

        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to clear storage: {}", e)))?;

        Ok(())
    }

    async fn exists(&self, key: &E::Key) -> Result<bool, DomainError> {
        let query = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE key = $1) as exists",
            self.table_name
        );

        let row = sqlx::query(&query)
            .bind(key.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to check existence: {}", e)))?;

        Ok(row.get("exists"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::global::{GlobalFilter, GlobalName, GlobalPatch, GlobalRecord};

    #[test]
    fn test_postgres_config_default() {
        let config = PostgresConfig::default();

        assert_eq!(config.max_connections, 5);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.connect_timeout_secs, 30);
    }

    #[test]
    fn test_postgres_config_builder() {
        let config = PostgresConfig::new("postgres://localhost/test")
            .with_max_connections(20)
            .with_connect_timeout(60);

        assert_eq!(config.url, "postgres://localhost/test");
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.connect_timeout_secs, 60);
    }

    // Requires a database: DATABASE_URL=postgres://... cargo test -- --ignored
    #[tokio::test]
    #[ignore = "Requires running PostgreSQL instance"]
    async fn test_postgres_update_where_and_conflict() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let storage: PostgresStorage<GlobalRecord> =
            PostgresStorage::connect(&PostgresConfig::new(url), "system_globals_test")
                .await
                .unwrap();
        storage.ensure_table().await.unwrap();
        storage.clear().await.unwrap();

        let name = GlobalName::new("testing_one").unwrap();
        storage
            .create(GlobalRecord::new(name.clone(), "1"))
            .await
            .unwrap();

        let duplicate = storage.create(GlobalRecord::new(name.clone(), "2")).await;
        assert!(matches!(duplicate, Err(DomainError::Conflict { .. })));

        let updated = storage
            .update_where(&GlobalFilter::name("testing_one"), &GlobalPatch::value("3"))
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(storage.get(&name).await.unwrap().unwrap().value(), "3");

        let other = GlobalName::new("TESTING_TWO").unwrap();
        storage
            .create(GlobalRecord::new(other.clone(), "x"))
            .await
            .unwrap();

        // Keyed path leaves the other row alone, the scan path reaches both
        storage
            .update_where(&GlobalFilter::name("testing_one"), &GlobalPatch::value("4"))
            .await
            .unwrap();
        assert_eq!(storage.get(&other).await.unwrap().unwrap().value(), "x");

        let updated = storage
            .update_where(&GlobalFilter::prefix("testing_"), &GlobalPatch::value("5"))
            .await
            .unwrap();
        assert_eq!(updated.len(), 2);

        storage.clear().await.unwrap();
    }
}
