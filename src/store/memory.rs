//! Thread-safe in-memory [`StorageBackend`] for headless hosts and tests.

// self
use crate::{
	_prelude::*,
	store::{StorageBackend, StoreError},
};

type ItemMap = Arc<RwLock<BTreeMap<String, String>>>;

/// Storage backend that keeps items in-process; clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage(ItemMap);
impl MemoryStorage {
	/// Number of stored items.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Copies every stored item, ordered by key.
	pub fn snapshot(&self) -> BTreeMap<String, String> {
		self.0.read().clone()
	}
}
impl StorageBackend for MemoryStorage {
	fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.0.read().get(key).cloned())
	}

	fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
		self.0.write().insert(key.to_owned(), value.to_owned());

		Ok(())
	}

	fn remove_item(&self, key: &str) -> Result<(), StoreError> {
		self.0.write().remove(key);

		Ok(())
	}

	fn keys(&self) -> Result<Vec<String>, StoreError> {
		Ok(self.0.read().keys().cloned().collect())
	}
}
