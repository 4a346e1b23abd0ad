//! System globals domain - named settings, coercion and the cached snapshot

mod entity;
mod snapshot;
mod value;

pub use entity::{
    GlobalFilter, GlobalName, GlobalPatch, GlobalRecord, GlobalValidationError,
    MAX_GLOBAL_NAME_LENGTH,
};
pub use snapshot::{DictOptions, GlobalSnapshot};
pub use value::GlobalValue;
