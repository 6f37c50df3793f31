//! Token values and the cache entries that hold them.

pub mod entry;
pub mod secret;
