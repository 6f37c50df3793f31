//! Token acquisition engine built around the [`Broker`] context object.
//!
//! A host owns one broker per client configuration. The broker answers token requests from the
//! cache, renews expired tokens through hidden-frame navigations, escalates to interactive
//! login when no user is known, and consumes provider responses the host feeds back through
//! [`Broker::handle_callback`].

pub mod callback;
pub mod expiry;
pub mod renew;

mod acquire;
mod login;

pub use acquire::TokenState;
pub use callback::*;
pub use expiry::*;
pub use renew::*;

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{IdTokenClaims, ResourceId, Session},
	cache::TokenStore,
	config::ClientConfig,
	correlate::RequestCorrelator,
	error::ConfigError,
	host::{Clock, Navigator, ScheduledTask, Scheduler, SystemClock},
	provider::{DefaultProviderStrategy, ProviderStrategy},
	store::{MemoryStorage, StorageBackend},
};

/// Implicit-flow token broker.
///
/// Clones share the same cache, session, pending renewals, and expiry timer.
#[derive(Clone)]
pub struct Broker {
	inner: Arc<BrokerInner>,
}
impl Broker {
	/// Starts building a broker for `config`.
	pub fn builder(config: ClientConfig) -> BrokerBuilder {
		BrokerBuilder::new(config)
	}

	/// Validated configuration the broker runs with.
	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	/// Token cache backing the broker.
	pub fn store(&self) -> &TokenStore {
		&self.inner.store
	}

	/// Pending-renewal registry.
	pub fn correlator(&self) -> &RequestCorrelator {
		&self.inner.correlator
	}

	/// Counters for silent renewals.
	pub fn renewal_metrics(&self) -> Arc<RenewalMetrics> {
		self.inner.renewal_metrics.clone()
	}

	/// Snapshot of the current session.
	pub fn user_info(&self) -> Session {
		self.inner.session.read().clone()
	}

	/// `true` between [`Broker::login`] and the handling of its response.
	pub fn login_in_progress(&self) -> bool {
		self.inner.login_in_progress.load(Ordering::SeqCst)
	}

	/// Resource whose token guards `endpoint`, if any.
	pub fn resource_for_endpoint(&self, endpoint: &str) -> Option<ResourceId> {
		self.inner.config.resource_for_endpoint(endpoint).cloned()
	}

	/// Rebuilds the session from the durable cache and returns it.
	pub fn refresh_data_from_cache(&self) -> Result<Session> {
		let inner = &self.inner;
		let now = inner.clock.now();
		let claims = self.cached_claims()?;
		let login_token =
			inner.store.valid_entry(&inner.config.login_resource, now)?.map(|entry| entry.token);
		let last_error = match inner.store.login_error()? {
			Some(error) => Some(error),
			None => inner.store.error(&inner.config.login_resource)?,
		};
		let session = Session::from_cache(claims.as_ref(), login_token, last_error);

		*inner.session.write() = session.clone();

		Ok(session)
	}

	fn now(&self) -> OffsetDateTime {
		self.inner.clock.now()
	}

	fn is_login_resource(&self, resource: &ResourceId) -> bool {
		resource == &self.inner.config.login_resource
	}

	fn is_client_resource(&self, resource: &ResourceId) -> bool {
		resource == &self.inner.client_resource
	}

	fn cached_claims(&self) -> Result<Option<IdTokenClaims>> {
		let Some(id_token) = self.inner.store.id_token()? else {
			return Ok(None);
		};

		match IdTokenClaims::decode(id_token.expose()) {
			Ok(claims) => Ok(Some(claims)),
			Err(_e) => {
				#[cfg(feature = "tracing")]
				tracing::warn!(error = %_e, "Ignoring an undecodable cached ID token.");

				Ok(None)
			},
		}
	}

	fn weak(&self) -> Weak<BrokerInner> {
		Arc::downgrade(&self.inner)
	}

	fn from_weak(weak: &Weak<BrokerInner>) -> Option<Self> {
		weak.upgrade().map(|inner| Self { inner })
	}

	// Runs once from the builder.
	fn initialize(&self) -> Result<()> {
		let session = self.refresh_data_from_cache()?;

		if !self.inner.navigator.is_top_level() {
			return Ok(());
		}

		let login_resource = &self.inner.config.login_resource;

		if session.authenticated {
			if let Some(entry) = self.inner.store.get(login_resource)? {
				self.arm_expiry(entry.expires_at);
			}
		} else if session.login_cached {
			self.renew(login_resource)?;
		}

		Ok(())
	}
}
impl Debug for Broker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("client_id", &self.inner.config.client_id)
			.field("login_resource", &self.inner.config.login_resource)
			.field("store", &self.inner.store)
			.field("correlator", &self.inner.correlator)
			.field("expiry", &self.inner.expiry)
			.field("login_in_progress", &self.login_in_progress())
			.finish()
	}
}

struct BrokerInner {
	config: ClientConfig,
	client_resource: ResourceId,
	store: TokenStore,
	correlator: RequestCorrelator,
	navigator: Arc<dyn Navigator>,
	scheduler: Arc<dyn Scheduler>,
	clock: Arc<dyn Clock>,
	strategy: Arc<dyn ProviderStrategy>,
	session: RwLock<Session>,
	expiry: ExpiryScheduler,
	renewal_timeouts: Mutex<HashMap<String, ScheduledTask>>,
	renewal_metrics: Arc<RenewalMetrics>,
	login_in_progress: AtomicBool,
}

/// Builder for [`Broker`] values.
///
/// The navigator and scheduler are required; storage defaults to [`MemoryStorage`], the clock
/// to [`SystemClock`], and the strategy to [`DefaultProviderStrategy`].
pub struct BrokerBuilder {
	config: ClientConfig,
	storage: Option<Arc<dyn StorageBackend>>,
	navigator: Option<Arc<dyn Navigator>>,
	scheduler: Option<Arc<dyn Scheduler>>,
	clock: Option<Arc<dyn Clock>>,
	strategy: Option<Arc<dyn ProviderStrategy>>,
}
impl BrokerBuilder {
	fn new(config: ClientConfig) -> Self {
		Self {
			config,
			storage: None,
			navigator: None,
			scheduler: None,
			clock: None,
			strategy: None,
		}
	}

	/// Sets the durable storage backend.
	pub fn storage<S>(mut self, storage: Arc<S>) -> Self
	where
		S: 'static + StorageBackend,
	{
		self.storage = Some(storage);

		self
	}

	/// Sets the navigator that performs frame loads and redirects.
	pub fn navigator<N>(mut self, navigator: Arc<N>) -> Self
	where
		N: 'static + Navigator,
	{
		self.navigator = Some(navigator);

		self
	}

	/// Sets the scheduler that runs renewal timeouts and the expiry timer.
	pub fn scheduler<S>(mut self, scheduler: Arc<S>) -> Self
	where
		S: 'static + Scheduler,
	{
		self.scheduler = Some(scheduler);

		self
	}

	/// Overrides the clock.
	pub fn clock<C>(mut self, clock: Arc<C>) -> Self
	where
		C: 'static + Clock,
	{
		self.clock = Some(clock);

		self
	}

	/// Overrides the provider strategy.
	pub fn strategy<P>(mut self, strategy: Arc<P>) -> Self
	where
		P: 'static + ProviderStrategy,
	{
		self.strategy = Some(strategy);

		self
	}

	/// Validates the collaborators, loads the session from the cache, and starts the broker.
	///
	/// In a top-level context a cached user without a valid login token triggers a silent
	/// login renewal, while a valid login token arms the expiry timer.
	pub fn build(self) -> Result<Broker> {
		let navigator =
			self.navigator.ok_or(ConfigError::MissingCollaborator { name: "navigator" })?;
		let scheduler =
			self.scheduler.ok_or(ConfigError::MissingCollaborator { name: "scheduler" })?;
		let storage = self.storage.unwrap_or_else(|| Arc::new(MemoryStorage::default()));
		let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
		let strategy = self.strategy.unwrap_or_else(|| Arc::new(DefaultProviderStrategy));
		let client_resource = ResourceId::new(self.config.client_id.as_ref())?;
		let store = TokenStore::new(
			storage,
			self.config.storage_prefix.clone(),
			self.config.expire_offset,
		);
		let expiry = ExpiryScheduler::new(self.config.renewal_lead);
		let broker = Broker {
			inner: Arc::new(BrokerInner {
				config: self.config,
				client_resource,
				store,
				correlator: RequestCorrelator::new(),
				navigator,
				scheduler,
				clock,
				strategy,
				session: RwLock::new(Session::default()),
				expiry,
				renewal_timeouts: Mutex::new(HashMap::new()),
				renewal_metrics: Default::default(),
				login_in_progress: AtomicBool::new(false),
			}),
		};

		broker.initialize()?;

		Ok(broker)
	}
}
impl Debug for BrokerBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BrokerBuilder")
			.field("config", &self.config)
			.field("storage_set", &self.storage.is_some())
			.field("navigator_set", &self.navigator.is_some())
			.field("scheduler_set", &self.scheduler.is_some())
			.finish()
	}
}
