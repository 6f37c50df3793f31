//! Consumer-facing token acquisition and cache maintenance.

// std
use std::sync::atomic::Ordering;
// self
use crate::{
	_prelude::*,
	auth::{ResourceId, Session, TokenSecret},
	correlate::RenewalOutcome,
	flows::Broker,
	oauth::RequestKind,
	obs::{self, Operation, OperationOutcome, OperationSpan},
	provider::ProviderErrorContext,
};

/// Where a resource stands after the cache check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenState {
	/// A cached token is valid beyond the skew window.
	Valid(TokenSecret),
	/// A user is known but the token is expired or absent; a silent renewal can fetch it.
	NeedsRenewal,
	/// No user is known; only an interactive login can help.
	NeedsLogin,
}

impl Broker {
	/// Classifies `resource` against the cache without side effects.
	pub fn check_cache(&self, resource: &ResourceId) -> Result<TokenState> {
		if let Some(entry) = self.inner.store.valid_entry(resource, self.now())? {
			return Ok(TokenState::Valid(entry.token));
		}
		if self.inner.session.read().login_cached || self.inner.store.id_token()?.is_some() {
			return Ok(TokenState::NeedsRenewal);
		}

		Ok(TokenState::NeedsLogin)
	}

	/// Returns a valid token for `resource`, renewing it silently when needed.
	///
	/// Calls for the same resource made while a renewal is pending share its outcome. When no
	/// user is known a top-level broker redirects to the interactive login, and the call fails
	/// with [`Error::LoginRequired`].
	pub async fn acquire_token(&self, resource: &str) -> Result<TokenSecret> {
		const OPERATION: Operation = Operation::Acquire;

		let span = OperationSpan::new(OPERATION, "acquire_token").with_resource(resource);

		obs::record_operation_outcome(OPERATION, OperationOutcome::Attempt);

		let result = span
			.instrument(async move {
				let resource = ResourceId::new(resource)?;

				match self.check_cache(&resource)? {
					TokenState::Valid(token) => Ok(token),
					TokenState::NeedsLogin => {
						self.escalate_to_login()?;

						Err(Error::LoginRequired)
					},
					TokenState::NeedsRenewal => {
						let handle = self.renew(&resource)?;
						let outcome = handle.outcome().await;

						self.settle(&resource, outcome)
					},
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_operation_outcome(OPERATION, OperationOutcome::Success),
			Err(_) => obs::record_operation_outcome(OPERATION, OperationOutcome::Failure),
		}

		result
	}

	/// Returns the cached token for `resource` if it is still valid; never navigates.
	pub fn get_cached_token(&self, resource: &str) -> Result<Option<TokenSecret>> {
		let resource = ResourceId::new(resource)?;

		Ok(self.inner.store.valid_entry(&resource, self.now())?.map(|entry| entry.token))
	}

	/// Returns the signed-in user.
	///
	/// A cached user whose login token has expired is renewed silently first; with no cached
	/// user the call fails with [`Error::UserUnavailable`].
	pub async fn get_user(&self) -> Result<Session> {
		let session = self.refresh_data_from_cache()?;

		if session.authenticated {
			return Ok(session);
		}
		if !session.login_cached {
			return Err(Error::UserUnavailable);
		}

		let login_resource = self.inner.config.login_resource.clone();

		self.acquire_token(&login_resource).await?;

		Ok(self.user_info())
	}

	/// Drops every cached token, error, and pending renewal, and disarms the expiry timer.
	///
	/// Callers waiting on a renewal fail with [`Error::RenewalCancelled`].
	pub fn clear_cache(&self) -> Result<()> {
		self.cancel_all_renewals();
		self.inner.expiry.cancel();
		self.inner.login_in_progress.store(false, Ordering::SeqCst);
		self.inner.store.clear()?;
		self.refresh_data_from_cache()?;

		Ok(())
	}

	/// Drops the cached token and error for one resource.
	pub fn clear_cache_for_resource(&self, resource: &str) -> Result<()> {
		let resource = ResourceId::new(resource)?;

		self.inner.store.clear_resource(&resource)?;

		if self.is_login_resource(&resource) {
			self.inner.expiry.cancel();
			self.refresh_data_from_cache()?;
		}

		Ok(())
	}

	fn settle(&self, resource: &ResourceId, outcome: RenewalOutcome) -> Result<TokenSecret> {
		match outcome {
			RenewalOutcome::Token(token) => Ok(token),
			RenewalOutcome::TimedOut =>
				Err(Error::RenewalTimeout { resource: resource.to_string() }),
			RenewalOutcome::Cancelled =>
				Err(Error::RenewalCancelled { resource: resource.to_string() }),
			RenewalOutcome::Error { code, description } => {
				let kind = if self.is_client_resource(resource) {
					RequestKind::RenewIdToken
				} else {
					RequestKind::RenewToken
				};
				let mut ctx = ProviderErrorContext::new(kind, code.as_str());

				if let Some(description) = &description {
					ctx = ctx.with_error_description(description.as_str());
				}

				let error_kind = self.inner.strategy.classify_error(&ctx);
				let interaction = error_kind.requires_interaction();

				// Only the login resource speaks for the provider session.
				if interaction && self.is_login_resource(resource) {
					#[cfg(feature = "tracing")]
					tracing::info!(
						resource = %resource,
						code = %code,
						"Escalating to interactive login."
					);

					self.escalate_to_login()?;

					return Err(Error::InteractionRequired {
						resource: resource.to_string(),
						code,
						description,
					});
				}

				Err(Error::Provider {
					resource: resource.to_string(),
					kind: error_kind,
					code,
					description,
				})
			},
		}
	}

	fn escalate_to_login(&self) -> Result<()> {
		if self.inner.navigator.is_top_level() { self.login() } else { Ok(()) }
	}
}
