//! Storage domain - Persistence contract for system globals

mod entity;
mod repository;

pub use entity::{EntityFilter, EntityPatch, StorageEntity, StorageKey};
pub use repository::Storage;

#[cfg(test)]
pub use repository::mock;
