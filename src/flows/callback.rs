//! Provider responses fed back by the host.
//!
//! A response is matched by its `state`: first against the pending interactive login, then
//! against the persisted renewal markers. A hidden frame sharing the storage consumes the marker
//! itself, so a response it relays to the opener is then matched against the opener's pending
//! renewals and settles them from the shared cache. Anything else is a correlation mismatch; it
//! is logged and discarded without touching the cache or the session. Matched responses are
//! consumed, so replaying one is a mismatch too.

// std
use std::sync::atomic::Ordering;
// self
use crate::{
	_prelude::*,
	auth::{IdTokenClaims, ResourceId, TokenSecret},
	cache::RenewalMarker,
	correlate::RenewalOutcome,
	flows::Broker,
	oauth::{ProviderResponse, RequestKind},
	obs::{self, Operation, OperationOutcome, OperationSpan},
};

const INVALID_ID_TOKEN: &str = "invalid_id_token";
const MISSING_TOKEN: &str = "missing_token";

/// What [`Broker::handle_callback`] did with a response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
	/// The fragment was not a provider response; nothing changed.
	NotCallback,
	/// The `state` matched no pending request; the response was discarded.
	Mismatch,
	/// Interactive login completed.
	LoggedIn {
		/// Display name of the signed-in user.
		user_name: String,
		/// Address the user was on when the login started.
		return_to: Option<Url>,
	},
	/// Interactive login failed.
	LoginFailed {
		/// OAuth `error` code (or a local code for unusable ID tokens).
		code: String,
		/// Error description.
		description: Option<String>,
	},
	/// A silent renewal stored a new token.
	Renewed {
		/// Renewed resource.
		resource: ResourceId,
	},
	/// A silent renewal failed.
	RenewalFailed {
		/// Resource whose renewal failed.
		resource: ResourceId,
		/// OAuth `error` code (or a local code for unusable ID tokens).
		code: String,
		/// Error description.
		description: Option<String>,
	},
}

impl Broker {
	/// Handles the URL fragment of the current document (or of a hidden frame).
	///
	/// The fragment is stripped from the visible address whenever it carried a provider
	/// response, whether or not the response matched.
	pub fn handle_callback(&self, fragment: &str) -> Result<CallbackOutcome> {
		let Some(response) = ProviderResponse::from_fragment(fragment) else {
			return Ok(CallbackOutcome::NotCallback);
		};
		let outcome = self.handle_response(response);

		self.inner.navigator.clear_fragment();

		outcome
	}

	/// Handles a response relayed without a URL (for example a frame message).
	pub fn handle_response(&self, response: ProviderResponse) -> Result<CallbackOutcome> {
		const OPERATION: Operation = Operation::Callback;

		let _span = OperationSpan::new(OPERATION, "handle_response").entered();

		obs::record_operation_outcome(OPERATION, OperationOutcome::Attempt);

		let result = self.dispatch(response);

		match &result {
			Ok(CallbackOutcome::LoggedIn { .. } | CallbackOutcome::Renewed { .. }) =>
				obs::record_operation_outcome(OPERATION, OperationOutcome::Success),
			_ => obs::record_operation_outcome(OPERATION, OperationOutcome::Failure),
		}

		result
	}

	fn dispatch(&self, response: ProviderResponse) -> Result<CallbackOutcome> {
		let store = &self.inner.store;
		let Some(state) = response.state.clone() else {
			#[cfg(feature = "tracing")]
			tracing::warn!("Discarding a provider response without state.");

			return Ok(CallbackOutcome::Mismatch);
		};

		if store.login_state()?.as_deref() == Some(state.as_str()) {
			return self.complete_login(response);
		}
		if let Some(marker) = store.take_renewal(&state)? {
			return self.complete_renewal(&state, marker, response);
		}
		if let Some(resource) = self.inner.correlator.resource(&state) {
			return self.complete_relayed_renewal(&state, resource, response);
		}

		#[cfg(feature = "tracing")]
		tracing::warn!(state = %state, "Discarding a provider response for an unknown state.");

		Ok(CallbackOutcome::Mismatch)
	}

	fn complete_login(&self, response: ProviderResponse) -> Result<CallbackOutcome> {
		let inner = &self.inner;
		let store = &inner.store;
		let nonce = store.login_nonce()?;
		let return_to = store.login_request()?.and_then(|raw| Url::parse(&raw).ok());
		let expires_in = response.expires_in();

		store.finish_login()?;
		inner.login_in_progress.store(false, Ordering::SeqCst);

		let (code, description) = match (response.error, response.id_token) {
			(Some(code), _) => (code, response.error_description),
			(None, Some(id_token)) => match self.accept_id_token(&id_token, nonce.as_deref()) {
				Ok(claims) => {
					let expires_at = claims
						.expires_at()
						.unwrap_or_else(|| self.now().saturating_add(expires_in));

					store.set_id_token(&id_token)?;
					store.put(&inner.client_resource, id_token, expires_at)?;
					store.clear_error(&inner.client_resource)?;
					store.clear_login_error()?;

					let session = self.refresh_data_from_cache()?;
					let login_entry = if session.authenticated {
						store.get(&inner.config.login_resource)?
					} else {
						None
					};

					if let Some(entry) = login_entry {
						self.arm_expiry(entry.expires_at);
					}

					let user_name = session.user_name;

					return Ok(CallbackOutcome::LoggedIn { user_name, return_to });
				},
				Err(e) => (INVALID_ID_TOKEN.to_owned(), Some(e.to_string())),
			},
			(None, None) =>
				(MISSING_TOKEN.to_owned(), Some("Login response carried no ID token.".into())),
		};

		store.set_login_error(description.as_deref().unwrap_or(&code))?;

		let mut session = inner.session.write();

		session.authenticated = false;
		session.last_error = Some(description.clone().unwrap_or_else(|| code.clone()));

		Ok(CallbackOutcome::LoginFailed { code, description })
	}

	fn complete_renewal(
		&self,
		state: &str,
		marker: RenewalMarker,
		response: ProviderResponse,
	) -> Result<CallbackOutcome> {
		let resource = marker.resource;
		let expires_in = response.expires_in();
		let kind = if marker.nonce.is_some() {
			RequestKind::RenewIdToken
		} else {
			RequestKind::RenewToken
		};
		let accepted = match (response.error, kind) {
			(Some(code), _) => Err((code, response.error_description)),
			(None, RequestKind::RenewIdToken) => match response.id_token {
				Some(id_token) => match self.accept_id_token(&id_token, marker.nonce.as_deref()) {
					Ok(claims) => Ok((id_token, claims.expires_at())),
					Err(e) => Err((INVALID_ID_TOKEN.to_owned(), Some(e.to_string()))),
				},
				None => Err((MISSING_TOKEN.to_owned(), None)),
			},
			(None, _) => match response.access_token.or(response.id_token) {
				Some(token) => Ok((token, None)),
				None => Err((MISSING_TOKEN.to_owned(), None)),
			},
		};
		let (outcome, callback) = match accepted {
			Ok((token, claimed_expiry)) => {
				let expires_at =
					claimed_expiry.unwrap_or_else(|| self.now().saturating_add(expires_in));

				self.store_renewed_token(&resource, kind, token.clone(), expires_at)?;

				let renewed = CallbackOutcome::Renewed { resource: resource.clone() };

				(RenewalOutcome::Token(token), renewed)
			},
			Err((code, description)) => {
				self.record_renewal_error(&resource, kind, &code, description.as_deref())?;

				let outcome =
					RenewalOutcome::Error { code: code.clone(), description: description.clone() };
				let failed = CallbackOutcome::RenewalFailed {
					resource: resource.clone(),
					code,
					description,
				};

				(outcome, failed)
			},
		};

		self.finish_renewal(state, &resource, outcome, callback)
	}

	// The context that received the response consumed the marker and already wrote the token
	// or the error to the shared storage; only the local waiters are left to settle.
	fn complete_relayed_renewal(
		&self,
		state: &str,
		resource: ResourceId,
		response: ProviderResponse,
	) -> Result<CallbackOutcome> {
		let store = &self.inner.store;
		let kind = if self.is_client_resource(&resource) {
			RequestKind::RenewIdToken
		} else {
			RequestKind::RenewToken
		};
		let cached =
			if response.error.is_none() { store.valid_entry(&resource, self.now())? } else { None };
		let (outcome, callback) = match cached {
			Some(entry) => {
				if self.is_login_resource(&resource) || matches!(kind, RequestKind::RenewIdToken) {
					self.refresh_data_from_cache()?;
				}

				let renewed = CallbackOutcome::Renewed { resource: resource.clone() };

				(RenewalOutcome::Token(entry.token), renewed)
			},
			None => {
				let code = response.error.unwrap_or_else(|| MISSING_TOKEN.to_owned());
				let description = match response.error_description {
					Some(description) => Some(description),
					None => store.error(&resource)?,
				};

				self.record_renewal_error(&resource, kind, &code, description.as_deref())?;

				let outcome =
					RenewalOutcome::Error { code: code.clone(), description: description.clone() };
				let failed = CallbackOutcome::RenewalFailed {
					resource: resource.clone(),
					code,
					description,
				};

				(outcome, failed)
			},
		};

		self.finish_renewal(state, &resource, outcome, callback)
	}

	fn finish_renewal(
		&self,
		state: &str,
		resource: &ResourceId,
		outcome: RenewalOutcome,
		callback: CallbackOutcome,
	) -> Result<CallbackOutcome> {
		let inner = &self.inner;

		self.cancel_renewal_timeout(state);

		if matches!(outcome, RenewalOutcome::Token(_)) {
			inner.renewal_metrics.record_succeeded();
		} else {
			inner.renewal_metrics.record_failed();
		}
		// Waiters live in whichever broker started the renewal; it may not be this one.
		if inner.correlator.contains(state) {
			inner.correlator.resolve(state, outcome);
		}

		let login_entry = match &callback {
			CallbackOutcome::Renewed { .. } if self.is_login_resource(resource) =>
				inner.store.get(resource)?,
			_ => None,
		};

		if let Some(entry) = login_entry {
			self.arm_expiry(entry.expires_at);
		}

		Ok(callback)
	}

	fn store_renewed_token(
		&self,
		resource: &ResourceId,
		kind: RequestKind,
		token: TokenSecret,
		expires_at: OffsetDateTime,
	) -> Result<()> {
		let store = &self.inner.store;

		if matches!(kind, RequestKind::RenewIdToken) {
			store.set_id_token(&token)?;
		}

		store.put(resource, token, expires_at)?;
		store.clear_error(resource)?;

		if self.is_login_resource(resource) || matches!(kind, RequestKind::RenewIdToken) {
			store.clear_login_error()?;
			self.refresh_data_from_cache()?;
		}

		Ok(())
	}

	fn record_renewal_error(
		&self,
		resource: &ResourceId,
		kind: RequestKind,
		code: &str,
		description: Option<&str>,
	) -> Result<()> {
		#[cfg(feature = "tracing")]
		tracing::warn!(resource = %resource, code, kind = %kind, "Silent renewal failed.");
		#[cfg(not(feature = "tracing"))]
		let _ = kind;

		self.inner.store.set_error(resource, description.unwrap_or(code))?;

		if self.is_login_resource(resource) {
			let mut session = self.inner.session.write();

			session.authenticated = false;
			session.token = None;
			session.last_error = Some(description.unwrap_or(code).to_owned());
		}

		Ok(())
	}

	fn accept_id_token(
		&self,
		id_token: &TokenSecret,
		expected_nonce: Option<&str>,
	) -> Result<IdTokenClaims> {
		let claims = IdTokenClaims::decode(id_token.expose())?;

		claims.verify_nonce(expected_nonce)?;
		claims.verify_audience(&self.inner.config.client_id)?;

		Ok(claims)
	}
}
