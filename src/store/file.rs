//! File-backed [`StorageBackend`] for desktop shells and long-lived headless hosts.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{StorageBackend, StoreError},
};

/// Persists items to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStorage {
	path: PathBuf,
	inner: Arc<RwLock<BTreeMap<String, String>>>,
}
impl FileStorage {
	/// Opens (or creates) storage at the provided path, eagerly loading existing items.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
		if !path.exists() {
			return Ok(BTreeMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(BTreeMap::new());
		}

		let mut de = serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(&mut de).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {} at `{}`: {}", path.display(), e.path(), e.inner()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create storage directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	/// Writes the snapshot to a sibling temp file, syncs it, and renames it over the target.
	fn persist_locked(&self, contents: &BTreeMap<String, String>) -> Result<(), StoreError> {
		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize storage snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl StorageBackend for FileStorage {
	fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.inner.read().get(key).cloned())
	}

	fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
		let mut guard = self.inner.write();
		let mut next = guard.clone();

		next.insert(key.to_owned(), value.to_owned());
		self.persist_locked(&next)?;

		*guard = next;

		Ok(())
	}

	fn remove_item(&self, key: &str) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		if !guard.contains_key(key) {
			return Ok(());
		}

		let mut next = guard.clone();

		next.remove(key);
		self.persist_locked(&next)?;

		*guard = next;

		Ok(())
	}

	fn keys(&self) -> Result<Vec<String>, StoreError> {
		Ok(self.inner.read().keys().cloned().collect())
	}
}
