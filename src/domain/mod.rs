//! Domain layer - Core entities and the storage/cache contracts

pub mod cache;
pub mod error;
pub mod global;
pub mod storage;

pub use cache::{Cache, CacheExt};
pub use error::DomainError;
pub use global::{
    DictOptions, GlobalFilter, GlobalName, GlobalPatch, GlobalRecord, GlobalSnapshot,
    GlobalValidationError, GlobalValue,
};
pub use storage::{EntityFilter, EntityPatch, Storage, StorageEntity, StorageKey};
