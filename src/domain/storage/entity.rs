//! Storage entity traits and types

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

/// Trait for types that can be used as storage keys
pub trait StorageKey: Clone + Debug + Send + Sync + Eq + std::hash::Hash {
    /// Returns the key as a string for storage backends that require string keys
    fn as_str(&self) -> &str;
}

/// Trait for types that can be stored
pub trait StorageEntity: Clone + Debug + Send + Sync + Serialize + DeserializeOwned {
    /// The key type for this entity
    type Key: StorageKey;

    /// Returns the entity's key
    fn key(&self) -> &Self::Key;
}

/// Row selector for filtered updates
pub trait EntityFilter<E>: Send + Sync {
    fn matches(&self, entity: &E) -> bool;

    /// The single storage key this filter can select, if any.
    ///
    /// Backends use it to touch one row instead of scanning the table.
    fn key_hint(&self) -> Option<&str> {
        None
    }
}

/// Field changes applied to every row selected by an [`EntityFilter`]
pub trait EntityPatch<E>: Send + Sync {
    fn apply(&self, entity: &mut E);
}
