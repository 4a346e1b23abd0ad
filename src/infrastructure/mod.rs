//! Infrastructure layer - Storage and cache backends plus the globals registry

pub mod cache;
pub mod globals;
pub mod logging;
pub mod storage;
