//! System globals registry with a write-through snapshot cache

mod bulk_update;
mod post_save;
mod registry;

pub use registry::{GlobalRegistry, DEFAULT_SNAPSHOT_KEY, DEFAULT_SNAPSHOT_TTL};
