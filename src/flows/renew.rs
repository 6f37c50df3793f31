//! Silent renewal through hidden-frame navigations.
//!
//! [`Broker::renew`] registers the renewal with the correlator, persists a [`RenewalMarker`] so
//! whichever context receives the response can recognise its `state`, arms the renewal
//! timeout, and asks the navigator to load the authorization URL into a hidden frame named
//! after the resource. Renewing the client's own resource asks for an ID token bound to a fresh
//! nonce instead of an access token.

mod metrics;

pub use metrics::RenewalMetrics;

// self
use crate::{
	_prelude::*,
	auth::{IdTokenClaims, ResourceId},
	cache::RenewalMarker,
	correlate::{Registration, RenewalHandle, RenewalOutcome},
	flows::Broker,
	oauth::{self, AuthorizeRequest, RequestKind},
	obs::{self, Operation, OperationOutcome, OperationSpan},
};

const RENEW_FRAME_PREFIX: &str = "oauth2_implicit.renew.";
const TIMEOUT_ERROR: &str = "Token renewal operation failed due to timeout.";

/// Name of the hidden frame that renews `resource`.
pub fn renew_frame_name(resource: &ResourceId) -> String {
	format!("{RENEW_FRAME_PREFIX}{resource}")
}

impl Broker {
	/// Starts a silent renewal for `resource`, or joins the one already pending.
	///
	/// The returned handle resolves exactly once: with the provider's answer, with
	/// [`RenewalOutcome::TimedOut`] after the configured renewal timeout, or with
	/// [`RenewalOutcome::Cancelled`] when the cache is cleared.
	pub fn renew(&self, resource: &ResourceId) -> Result<RenewalHandle> {
		const OPERATION: Operation = Operation::SilentRenew;

		let _span = OperationSpan::new(OPERATION, "renew").with_resource(resource).entered();
		let now = self.now();
		let handle = match self.inner.correlator.begin(resource, now) {
			Registration::Joined(handle) => {
				self.inner.renewal_metrics.record_joined();

				return Ok(handle);
			},
			Registration::Started(handle) => handle,
		};

		obs::record_operation_outcome(OPERATION, OperationOutcome::Attempt);
		self.inner.renewal_metrics.record_started();

		match self.launch_renewal(&handle, now) {
			Ok(()) => Ok(handle),
			Err(e) => {
				self.abandon_renewal(handle.state());
				obs::record_operation_outcome(OPERATION, OperationOutcome::Failure);

				Err(e)
			},
		}
	}

	fn launch_renewal(&self, handle: &RenewalHandle, now: OffsetDateTime) -> Result<()> {
		let inner = &self.inner;
		let resource = handle.resource();
		let state = handle.state();
		let claims = self.cached_claims()?;
		let login_hint = claims.as_ref().and_then(IdTokenClaims::user_name);
		let domain_hint = claims.as_ref().and_then(IdTokenClaims::domain_hint);
		let (request, nonce) = if self.is_client_resource(resource) {
			let nonce = oauth::random_state();
			let request =
				AuthorizeRequest::new(RequestKind::RenewIdToken, state).with_nonce(&nonce);

			(request, Some(nonce))
		} else {
			let request = AuthorizeRequest::new(RequestKind::RenewToken, state)
				.with_resource(resource.clone());

			(request, None)
		};
		let url = request
			.with_user_hints(login_hint, domain_hint)
			.to_url(&inner.config, inner.strategy.as_ref())?;

		let marker = RenewalMarker { resource: resource.clone(), nonce, started_at: now };

		inner.store.put_renewal(state, &marker)?;

		let weak = self.weak();
		let timeout_state = state.to_owned();
		let timeout_resource = resource.clone();
		let task = inner.scheduler.schedule(
			inner.config.renewal_timeout,
			Box::new(move || {
				if let Some(broker) = Broker::from_weak(&weak) {
					broker.expire_renewal(&timeout_state, &timeout_resource);
				}
			}),
		);

		inner.renewal_timeouts.lock().insert(state.to_owned(), task);
		inner.navigator.load_frame(&renew_frame_name(resource), &url);

		Ok(())
	}

	// Timer job: no response reached this broker within the renewal window.
	fn expire_renewal(&self, state: &str, resource: &ResourceId) {
		let inner = &self.inner;
		let _span = OperationSpan::new(Operation::SilentRenew, "expire_renewal")
			.with_resource(resource)
			.entered();

		inner.renewal_timeouts.lock().remove(state);

		if !inner.correlator.contains(state) {
			return;
		}

		// Another context sharing the storage consumed the marker and cached the token.
		let answered_elsewhere = matches!(inner.store.take_renewal(state), Ok(None));
		let cached = if answered_elsewhere {
			inner.store.valid_entry(resource, self.now()).ok().flatten()
		} else {
			None
		};

		if let Some(entry) = cached {
			inner.renewal_metrics.record_succeeded();
			inner.correlator.resolve(state, RenewalOutcome::Token(entry.token));
			obs::record_operation_outcome(Operation::SilentRenew, OperationOutcome::Success);

			return;
		}
		if inner.correlator.expire(state).is_none() {
			return;
		}

		inner.renewal_metrics.record_timed_out();
		obs::record_operation_outcome(Operation::SilentRenew, OperationOutcome::Failure);

		if let Err(_e) = inner.store.set_error(resource, TIMEOUT_ERROR) {
			#[cfg(feature = "tracing")]
			tracing::warn!(error = %_e, "Failed to record the renewal timeout.");
		}
		if self.is_login_resource(resource) {
			inner.session.write().last_error = Some(TIMEOUT_ERROR.into());
		}
	}

	fn abandon_renewal(&self, state: &str) {
		if let Some(task) = self.inner.renewal_timeouts.lock().remove(state) {
			task.cancel();
		}

		let _ = self.inner.store.take_renewal(state);

		self.inner.correlator.resolve(state, RenewalOutcome::Cancelled);
	}

	pub(crate) fn cancel_renewal_timeout(&self, state: &str) {
		if let Some(task) = self.inner.renewal_timeouts.lock().remove(state) {
			task.cancel();
		}
	}

	pub(crate) fn cancel_all_renewals(&self) {
		let tasks = self.inner.renewal_timeouts.lock().drain().collect::<Vec<_>>();

		for (_, task) in tasks {
			task.cancel();
		}

		self.inner.correlator.cancel_all();
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn frame_names_are_scoped_per_resource() {
		let resource = ResourceId::new("https://graph.example.com").expect("Resource fixture.");

		assert_eq!(
			renew_frame_name(&resource),
			"oauth2_implicit.renew.https://graph.example.com"
		);
	}
}
