//! Token cache layout on top of a durable [`StorageBackend`].
//!
//! Every key starts with the configured prefix:
//!
//! - `entry.{resource}`: JSON [`CacheEntry`] (token + expiry, written as one value)
//! - `error.{resource}`: last renewal error for the resource
//! - `renew.{state}`: JSON [`RenewalMarker`] for an in-flight silent renewal
//! - `login.state`, `login.nonce`, `login.error`, `login.request`: interactive login bookkeeping
//! - `id_token`: raw ID token of the signed-in user
//!
//! Writes go straight to the backend. Keys are independent; there is no multi-key transaction.

// self
use crate::{
	_prelude::*,
	auth::{CacheEntry, ResourceId, TokenSecret},
	store::{StorageBackend, StoreError},
};

const ENTRY: &str = "entry.";
const ERROR: &str = "error.";
const RENEW: &str = "renew.";
const LOGIN_STATE: &str = "login.state";
const LOGIN_NONCE: &str = "login.nonce";
const LOGIN_ERROR: &str = "login.error";
const LOGIN_REQUEST: &str = "login.request";
const ID_TOKEN: &str = "id_token";

/// Durable record of a silent renewal that is waiting for a provider response.
///
/// Persisting the marker lets any context sharing the storage (for example the hidden frame
/// the response lands in) recognise the `state` and store the token it carries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalMarker {
	/// Resource being renewed.
	pub resource: ResourceId,
	/// Nonce sent with ID-token renewals.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<String>,
	/// When the renewal was started.
	#[serde(with = "time::serde::timestamp")]
	pub started_at: OffsetDateTime,
}

/// Persistent token cache keyed by resource.
#[derive(Clone)]
pub struct TokenStore {
	backend: Arc<dyn StorageBackend>,
	prefix: String,
	skew: Duration,
}
impl TokenStore {
	/// Creates a store that namespaces keys under `prefix` and applies `skew` on validity checks.
	pub fn new(
		backend: Arc<dyn StorageBackend>,
		prefix: impl Into<String>,
		skew: Duration,
	) -> Self {
		Self { backend, prefix: prefix.into(), skew }
	}

	/// Skew subtracted from expiry by [`TokenStore::is_valid`].
	pub fn skew(&self) -> Duration {
		self.skew
	}

	/// Returns the stored entry for `resource`, valid or not.
	pub fn get(&self, resource: &ResourceId) -> Result<Option<CacheEntry>, StoreError> {
		self.read_json(&self.key(ENTRY, resource))
	}

	/// Overwrites the entry for `resource`.
	pub fn put(
		&self,
		resource: &ResourceId,
		token: TokenSecret,
		expires_at: OffsetDateTime,
	) -> Result<CacheEntry, StoreError> {
		let entry = CacheEntry::new(resource.clone(), token, expires_at);

		self.write_json(&self.key(ENTRY, resource), &entry)?;

		Ok(entry)
	}

	/// `true` iff `now < entry.expires_at - skew`.
	pub fn is_valid(&self, entry: &CacheEntry, now: OffsetDateTime) -> bool {
		entry.is_valid_at(now, self.skew)
	}

	/// Returns the token for `resource` only if it is still valid at `now`.
	pub fn valid_entry(
		&self,
		resource: &ResourceId,
		now: OffsetDateTime,
	) -> Result<Option<CacheEntry>, StoreError> {
		Ok(self.get(resource)?.filter(|entry| self.is_valid(entry, now)))
	}

	/// Removes every key under the prefix.
	pub fn clear(&self) -> Result<(), StoreError> {
		for key in self.backend.keys()? {
			if key.starts_with(&self.prefix) {
				self.backend.remove_item(&key)?;
			}
		}

		Ok(())
	}

	/// Removes the entry and error record for `resource`.
	pub fn clear_resource(&self, resource: &ResourceId) -> Result<(), StoreError> {
		self.backend.remove_item(&self.key(ENTRY, resource))?;
		self.backend.remove_item(&self.key(ERROR, resource))
	}

	/// Last renewal error recorded for `resource`.
	pub fn error(&self, resource: &ResourceId) -> Result<Option<String>, StoreError> {
		self.backend.get_item(&self.key(ERROR, resource))
	}

	/// Records a renewal error for `resource`, replacing the previous one.
	pub fn set_error(&self, resource: &ResourceId, error: &str) -> Result<(), StoreError> {
		self.backend.set_item(&self.key(ERROR, resource), error)
	}

	/// Clears the renewal error for `resource`.
	pub fn clear_error(&self, resource: &ResourceId) -> Result<(), StoreError> {
		self.backend.remove_item(&self.key(ERROR, resource))
	}

	/// Persists the marker for an in-flight renewal.
	pub fn put_renewal(&self, state: &str, marker: &RenewalMarker) -> Result<(), StoreError> {
		self.write_json(&self.key(RENEW, state), marker)
	}

	/// Looks up the in-flight renewal that minted `state`.
	pub fn renewal(&self, state: &str) -> Result<Option<RenewalMarker>, StoreError> {
		self.read_json(&self.key(RENEW, state))
	}

	/// Removes and returns the marker for `state`.
	pub fn take_renewal(&self, state: &str) -> Result<Option<RenewalMarker>, StoreError> {
		let marker = self.renewal(state)?;

		if marker.is_some() {
			self.backend.remove_item(&self.key(RENEW, state))?;
		}

		Ok(marker)
	}

	/// Removes every renewal marker.
	pub fn clear_renewals(&self) -> Result<(), StoreError> {
		let prefix = format!("{}{RENEW}", self.prefix);

		for key in self.backend.keys()? {
			if key.starts_with(&prefix) {
				self.backend.remove_item(&key)?;
			}
		}

		Ok(())
	}

	/// Records the state and nonce of an interactive login about to redirect.
	pub fn begin_login(&self, state: &str, nonce: &str, request: &str) -> Result<(), StoreError> {
		self.backend.set_item(&self.plain(LOGIN_STATE), state)?;
		self.backend.set_item(&self.plain(LOGIN_NONCE), nonce)?;
		self.backend.set_item(&self.plain(LOGIN_REQUEST), request)?;
		self.backend.remove_item(&self.plain(LOGIN_ERROR))
	}

	/// State of the pending interactive login, if any.
	pub fn login_state(&self) -> Result<Option<String>, StoreError> {
		self.backend.get_item(&self.plain(LOGIN_STATE))
	}

	/// Nonce of the pending interactive login, if any.
	pub fn login_nonce(&self) -> Result<Option<String>, StoreError> {
		self.backend.get_item(&self.plain(LOGIN_NONCE))
	}

	/// URL the user was on when the interactive login started.
	pub fn login_request(&self) -> Result<Option<String>, StoreError> {
		self.backend.get_item(&self.plain(LOGIN_REQUEST))
	}

	/// Clears the pending-login state and nonce once the login response is handled.
	pub fn finish_login(&self) -> Result<(), StoreError> {
		self.backend.remove_item(&self.plain(LOGIN_STATE))?;
		self.backend.remove_item(&self.plain(LOGIN_NONCE))
	}

	/// Last login error, if any.
	pub fn login_error(&self) -> Result<Option<String>, StoreError> {
		self.backend.get_item(&self.plain(LOGIN_ERROR))
	}

	/// Records a login error.
	pub fn set_login_error(&self, error: &str) -> Result<(), StoreError> {
		self.backend.set_item(&self.plain(LOGIN_ERROR), error)
	}

	/// Clears the login error.
	pub fn clear_login_error(&self) -> Result<(), StoreError> {
		self.backend.remove_item(&self.plain(LOGIN_ERROR))
	}

	/// Raw ID token of the signed-in user.
	pub fn id_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		Ok(self.backend.get_item(&self.plain(ID_TOKEN))?.map(TokenSecret::new))
	}

	/// Stores the raw ID token of the signed-in user.
	pub fn set_id_token(&self, token: &TokenSecret) -> Result<(), StoreError> {
		self.backend.set_item(&self.plain(ID_TOKEN), token.expose())
	}

	fn key(&self, kind: &str, name: &str) -> String {
		format!("{}{kind}{name}", self.prefix)
	}

	fn plain(&self, name: &str) -> String {
		format!("{}{name}", self.prefix)
	}

	fn read_json<T>(&self, key: &str) -> Result<Option<T>, StoreError>
	where
		T: for<'de> Deserialize<'de>,
	{
		let Some(raw) = self.backend.get_item(key)? else {
			return Ok(None);
		};

		serde_json::from_str(&raw).map(Some).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse `{key}`: {e}"),
		})
	}

	fn write_json<T>(&self, key: &str, value: &T) -> Result<(), StoreError>
	where
		T: Serialize,
	{
		let raw = serde_json::to_string(value).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize `{key}`: {e}"),
		})?;

		self.backend.set_item(key, &raw)
	}
}
impl Debug for TokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenStore")
			.field("prefix", &self.prefix)
			.field("skew", &self.skew)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::store::MemoryStorage;

	fn store() -> (TokenStore, MemoryStorage) {
		let backend = MemoryStorage::default();
		let store = TokenStore::new(Arc::new(backend.clone()), "test.", Duration::seconds(5));

		(store, backend)
	}

	fn resource(value: &str) -> ResourceId {
		ResourceId::new(value).expect("Resource fixture should be valid.")
	}

	#[test]
	fn put_overwrites_and_get_reads_back() {
		let (store, _) = store();
		let api = resource("api1");
		let first = macros::datetime!(2025-01-01 01:00 UTC);
		let second = macros::datetime!(2025-01-01 02:00 UTC);

		store.put(&api, TokenSecret::new("t1"), first).expect("First put should succeed.");
		store.put(&api, TokenSecret::new("t2"), second).expect("Second put should succeed.");

		let entry = store.get(&api).expect("Get should succeed.").expect("Entry should exist.");

		assert_eq!(entry.token.expose(), "t2");
		assert_eq!(entry.expires_at, second);
		assert_eq!(entry.resource, api);
	}

	#[test]
	fn valid_entry_honours_skew() {
		let (store, _) = store();
		let api = resource("api1");
		let now = macros::datetime!(2025-01-01 00:00:00 UTC);

		store
			.put(&api, TokenSecret::new("t"), now + Duration::seconds(10))
			.expect("Put should succeed.");

		assert!(store.valid_entry(&api, now).expect("Lookup should succeed.").is_some());
		assert!(
			store
				.valid_entry(&api, now + Duration::seconds(5))
				.expect("Lookup should succeed.")
				.is_none()
		);
	}

	#[test]
	fn clear_resource_leaves_other_resources() {
		let (store, _) = store();
		let a = resource("a");
		let b = resource("b");
		let expires = macros::datetime!(2025-01-01 01:00 UTC);

		store.put(&a, TokenSecret::new("ta"), expires).expect("Put should succeed.");
		store.put(&b, TokenSecret::new("tb"), expires).expect("Put should succeed.");
		store.set_error(&a, "boom").expect("Error write should succeed.");
		store.clear_resource(&a).expect("Clear should succeed.");

		assert!(store.get(&a).expect("Get should succeed.").is_none());
		assert!(store.error(&a).expect("Error read should succeed.").is_none());
		assert!(store.get(&b).expect("Get should succeed.").is_some());
	}

	#[test]
	fn clear_only_touches_prefixed_keys() {
		let (store, backend) = store();

		backend.set_item("other.app", "keep").expect("Foreign write should succeed.");
		store
			.put(&resource("a"), TokenSecret::new("t"), macros::datetime!(2025-01-01 01:00 UTC))
			.expect("Put should succeed.");
		store.begin_login("s", "n", "https://app/").expect("Login bookkeeping should succeed.");
		store.clear().expect("Clear should succeed.");

		assert_eq!(backend.keys().expect("Key listing should succeed."), vec!["other.app"]);
	}

	#[test]
	fn renewal_markers_are_taken_once() {
		let (store, _) = store();
		let marker = RenewalMarker {
			resource: resource("api"),
			nonce: None,
			started_at: macros::datetime!(2025-01-01 00:00 UTC),
		};

		store.put_renewal("state-1", &marker).expect("Marker write should succeed.");

		assert_eq!(store.take_renewal("state-1").expect("Take should succeed."), Some(marker));
		assert_eq!(store.take_renewal("state-1").expect("Take should succeed."), None);
	}

	#[test]
	fn corrupt_entries_surface_serialization_errors() {
		let (store, backend) = store();

		backend.set_item("test.entry.api", "not json").expect("Raw write should succeed.");

		assert!(matches!(store.get(&resource("api")), Err(StoreError::Serialization { .. })));
	}
}
