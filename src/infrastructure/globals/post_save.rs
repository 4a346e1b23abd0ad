//! Record saves that keep the snapshot in step

use tracing::{debug, info};

use crate::domain::global::GlobalRecord;
use crate::domain::DomainError;

use super::registry::GlobalRegistry;

impl GlobalRegistry {
    /// Inserts or updates a whole record, then pushes its value into the snapshot
    pub async fn save(&self, record: GlobalRecord) -> Result<GlobalRecord, DomainError> {
        debug!(name = %record.name(), "Saving system global record");
        let saved = self.storage.save(record).await?;
        info!(name = %saved.name(), "System global record saved");

        self.after_save(&saved).await;
        Ok(saved)
    }

    async fn after_save(&self, record: &GlobalRecord) {
        self.write_through(vec![(
            record.name().to_string(),
            record.value().to_string(),
        )])
        .await;
    }
}
