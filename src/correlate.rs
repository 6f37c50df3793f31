//! Correlation of silent renewals with the provider responses that complete them.
//!
//! Each renewal is registered under an unpredictable `state` that travels to the provider and
//! back. Callers waiting on the same resource share one pending renewal; the first outcome
//! delivered for a state wakes all of them, and later deliveries are ignored.

// crates.io
use async_lock::OnceCell;
// self
use crate::{
	_prelude::*,
	auth::{ResourceId, TokenSecret},
	oauth, obs,
};

/// Result delivered to every caller waiting on a renewal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenewalOutcome {
	/// Provider returned a token.
	Token(TokenSecret),
	/// Provider returned an error.
	Error {
		/// OAuth `error` code.
		code: String,
		/// OAuth `error_description`.
		description: Option<String>,
	},
	/// No response arrived within the renewal window.
	TimedOut,
	/// The renewal was abandoned by a logout or cache clear.
	Cancelled,
}

impl RenewalOutcome {
	/// Stable label for metric fields.
	pub const fn label(&self) -> &'static str {
		match self {
			Self::Token(_) => "token",
			Self::Error { .. } => "error",
			Self::TimedOut => "timed_out",
			Self::Cancelled => "cancelled",
		}
	}
}

/// Waiter side of a pending renewal.
#[derive(Clone)]
pub struct RenewalHandle {
	state: String,
	resource: ResourceId,
	slot: Arc<OnceCell<RenewalOutcome>>,
}
impl RenewalHandle {
	/// Correlation state of the renewal.
	pub fn state(&self) -> &str {
		&self.state
	}

	/// Resource being renewed.
	pub fn resource(&self) -> &ResourceId {
		&self.resource
	}

	/// Outcome, if it has already been delivered.
	pub fn try_outcome(&self) -> Option<RenewalOutcome> {
		self.slot.get().cloned()
	}

	/// Waits for the outcome.
	pub async fn outcome(&self) -> RenewalOutcome {
		self.slot.wait().await.clone()
	}
}
impl Debug for RenewalHandle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RenewalHandle")
			.field("state", &self.state)
			.field("resource", &self.resource)
			.field("resolved", &self.slot.is_initialized())
			.finish()
	}
}

/// Result of [`RequestCorrelator::begin`].
#[derive(Clone, Debug)]
pub enum Registration {
	/// A new renewal was registered; the caller must start the navigation.
	Started(RenewalHandle),
	/// A renewal for the resource was already pending; the caller shares it.
	Joined(RenewalHandle),
}
impl Registration {
	/// Waiter handle regardless of how it was obtained.
	pub fn handle(&self) -> &RenewalHandle {
		match self {
			Self::Started(handle) | Self::Joined(handle) => handle,
		}
	}

	/// Consumes the registration into its handle.
	pub fn into_handle(self) -> RenewalHandle {
		match self {
			Self::Started(handle) | Self::Joined(handle) => handle,
		}
	}

	/// `true` when this call registered the renewal.
	pub fn is_started(&self) -> bool {
		matches!(self, Self::Started(_))
	}
}

struct PendingRenewal {
	resource: ResourceId,
	created_at: OffsetDateTime,
	slot: Arc<OnceCell<RenewalOutcome>>,
}

#[derive(Default)]
struct CorrelatorState {
	by_state: HashMap<String, PendingRenewal>,
	by_resource: HashMap<ResourceId, String>,
}
impl CorrelatorState {
	fn take(&mut self, state: &str) -> Option<PendingRenewal> {
		let pending = self.by_state.remove(state)?;

		if self.by_resource.get(&pending.resource).is_some_and(|current| current == state) {
			self.by_resource.remove(&pending.resource);
		}

		Some(pending)
	}
}

/// In-memory registry of pending renewals keyed by correlation state.
#[derive(Default)]
pub struct RequestCorrelator {
	inner: Mutex<CorrelatorState>,
}
impl RequestCorrelator {
	/// Creates an empty correlator.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a renewal for `resource`, or joins the one already pending.
	pub fn begin(&self, resource: &ResourceId, now: OffsetDateTime) -> Registration {
		let mut inner = self.inner.lock();
		let joined = inner.by_resource.get(resource).and_then(|state| {
			inner.by_state.get(state).map(|pending| RenewalHandle {
				state: state.clone(),
				resource: pending.resource.clone(),
				slot: pending.slot.clone(),
			})
		});

		if let Some(handle) = joined {
			return Registration::Joined(handle);
		}

		let state = loop {
			let candidate = oauth::random_state();

			if !inner.by_state.contains_key(&candidate) {
				break candidate;
			}
		};
		let slot = Arc::new(OnceCell::new());

		inner.by_state.insert(
			state.clone(),
			PendingRenewal { resource: resource.clone(), created_at: now, slot: slot.clone() },
		);
		inner.by_resource.insert(resource.clone(), state.clone());

		Registration::Started(RenewalHandle { state, resource: resource.clone(), slot })
	}

	/// Delivers `outcome` to the renewal registered under `state`.
	///
	/// Returns the renewed resource, or `None` when the state is unknown or already resolved;
	/// that case is a correlation mismatch and changes nothing.
	pub fn resolve(&self, state: &str, outcome: RenewalOutcome) -> Option<ResourceId> {
		let Some(pending) = self.inner.lock().take(state) else {
			#[cfg(feature = "tracing")]
			tracing::warn!(state, "Discarding renewal outcome for an unknown correlation state.");

			return None;
		};

		obs::record_renewal_outcome(&outcome);

		// The entry left the map under the lock, so this is the only delivery.
		let _ = pending.slot.set_blocking(outcome);

		Some(pending.resource)
	}

	/// Resolves `state` with [`RenewalOutcome::TimedOut`].
	pub fn expire(&self, state: &str) -> Option<ResourceId> {
		let resource = self.resolve(state, RenewalOutcome::TimedOut)?;

		#[cfg(feature = "tracing")]
		tracing::warn!(resource = %resource, "Token renewal timed out.");

		Some(resource)
	}

	/// Resolves every pending renewal with [`RenewalOutcome::Cancelled`].
	pub fn cancel_all(&self) -> Vec<ResourceId> {
		let drained = {
			let mut inner = self.inner.lock();

			inner.by_resource.clear();
			inner.by_state.drain().map(|(_, pending)| pending).collect::<Vec<_>>()
		};

		drained
			.into_iter()
			.map(|pending| {
				obs::record_renewal_outcome(&RenewalOutcome::Cancelled);

				let _ = pending.slot.set_blocking(RenewalOutcome::Cancelled);

				pending.resource
			})
			.collect()
	}

	/// `true` while `state` is pending.
	pub fn contains(&self, state: &str) -> bool {
		self.inner.lock().by_state.contains_key(state)
	}

	/// Resource of the renewal pending under `state`, if any.
	pub fn resource(&self, state: &str) -> Option<ResourceId> {
		self.inner.lock().by_state.get(state).map(|pending| pending.resource.clone())
	}

	/// State of the renewal pending for `resource`, if any.
	pub fn pending_state(&self, resource: &ResourceId) -> Option<String> {
		self.inner.lock().by_resource.get(resource).cloned()
	}

	/// When the renewal under `state` was registered.
	pub fn created_at(&self, state: &str) -> Option<OffsetDateTime> {
		self.inner.lock().by_state.get(state).map(|pending| pending.created_at)
	}

	/// Number of pending renewals.
	pub fn len(&self) -> usize {
		self.inner.lock().by_state.len()
	}

	/// `true` when nothing is pending.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl Debug for RequestCorrelator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestCorrelator").field("pending", &self.len()).finish()
	}
}
