//! Filtered bulk updates that keep the snapshot in step

use tracing::{debug, info, instrument};

use crate::domain::global::{GlobalFilter, GlobalPatch};
use crate::domain::DomainError;

use super::registry::GlobalRegistry;

impl GlobalRegistry {
    /// Applies `patch` to every record matched by `filter` and returns the
    /// number of updated rows.
    ///
    /// When the patch sets a value, the new value of each affected record is
    /// pushed into the snapshot. Description-only patches leave the cache alone.
    #[instrument(skip(self, patch), fields(changes_value = patch.changes_value()))]
    pub async fn update_where(
        &self,
        filter: &GlobalFilter,
        patch: &GlobalPatch,
    ) -> Result<usize, DomainError> {
        debug!("Updating matching system globals");
        let updated = self.storage.update_where(filter, patch).await?;
        info!(count = updated.len(), "System globals bulk updated");

        if patch.changes_value() {
            let entries = updated
                .iter()
                .map(|r| (r.name().to_string(), r.value().to_string()))
                .collect();
            self.write_through(entries).await;
        }

        Ok(updated.len())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::cache::MockCache;
    use crate::domain::global::{DictOptions, GlobalFilter, GlobalPatch, GlobalValue};
    use crate::domain::storage::mock::MockStorage;
    use crate::infrastructure::globals::registry::tests::{create_registry, record};

    fn storage() -> MockStorage<crate::domain::global::GlobalRecord> {
        MockStorage::new()
            .with_entity(record("feature_a", "no"))
            .with_entity(record("feature_b", "no"))
            .with_entity(record("limit", "10"))
    }

    #[tokio::test]
    async fn test_bulk_update_pushes_values() {
        let (registry, storage, _) = create_registry(storage(), MockCache::new());
        registry.as_dict(&DictOptions::default()).await.unwrap();
        let reads = storage.read_count();

        let count = registry
            .update_where(&GlobalFilter::prefix("FEATURE_"), &GlobalPatch::value("yes"))
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            registry.get_value("feature_a").await.unwrap(),
            GlobalValue::Boolean(true)
        );
        assert_eq!(
            registry.get_value("feature_b").await.unwrap(),
            GlobalValue::Boolean(true)
        );
        assert_eq!(
            registry.get_value("limit").await.unwrap(),
            GlobalValue::Integer(10)
        );
        assert_eq!(storage.read_count(), reads);
    }

    #[tokio::test]
    async fn test_description_only_patch_skips_cache() {
        let (registry, storage, cache) = create_registry(storage(), MockCache::new());
        registry.as_dict(&DictOptions::default()).await.unwrap();
        let writes = cache.write_count();

        let count = registry
            .update_where(&GlobalFilter::name("limit"), &GlobalPatch::description("Max items"))
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(cache.write_count(), writes);
        assert_eq!(storage.snapshot()["limit"].description(), "Max items");
    }

    #[tokio::test]
    async fn test_no_match_skips_cache() {
        let (registry, _, cache) = create_registry(storage(), MockCache::new());

        let count = registry
            .update_where(&GlobalFilter::name("missing"), &GlobalPatch::value("1"))
            .await
            .unwrap();

        assert_eq!(count, 0);
        assert_eq!(cache.write_count(), 0);
    }

    #[tokio::test]
    async fn test_bulk_update_all_then_set_new() {
        let (registry, storage, _) = create_registry(storage(), MockCache::new());

        let count = registry
            .update_where(&GlobalFilter::All, &GlobalPatch::value("0"))
            .await
            .unwrap();
        assert_eq!(count, 3);

        registry.set("fresh", "1").await.unwrap();

        let count = registry
            .update_where(&GlobalFilter::All, &GlobalPatch::value("2"))
            .await
            .unwrap();
        assert_eq!(count, 4);
        assert_eq!(storage.snapshot().len(), 4);
        assert_eq!(
            registry.get_value("fresh").await.unwrap(),
            GlobalValue::Integer(2)
        );
    }

    #[tokio::test]
    async fn test_value_and_description_patch() {
        let (registry, storage, _) = create_registry(storage(), MockCache::new());

        let patch = GlobalPatch::value("25").with_description("Raised");
        registry
            .update_where(&GlobalFilter::Names(vec!["limit".to_string()]), &patch)
            .await
            .unwrap();

        assert_eq!(storage.snapshot()["limit"].description(), "Raised");
        assert_eq!(
            registry.get_value("limit").await.unwrap(),
            GlobalValue::Integer(25)
        );
    }
}
