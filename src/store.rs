//! Durable key-value storage contracts and built-in backends.
//!
//! Backends model an origin-scoped store such as a browser's `localStorage`: string keys,
//! string values, and every write visible to the next reader. The
//! [`TokenStore`](crate::cache::TokenStore) layers the token cache layout on top.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

// self
use crate::_prelude::*;

/// Storage backend contract implemented by durable key-value stores.
///
/// Each call must be atomic at the key level and must reach durable storage before it
/// returns; no buffering across calls.
pub trait StorageBackend
where
	Self: Send + Sync,
{
	/// Returns the value stored under `key`.
	fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Stores `value` under `key`, replacing any previous value.
	fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;

	/// Removes `key` if present.
	fn remove_item(&self, key: &str) -> Result<(), StoreError>;

	/// Lists every key currently stored.
	fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// Error type produced by [`StorageBackend`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend or the cache layout.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
