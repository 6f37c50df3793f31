//! Interactive login and logout redirects.

// std
use std::sync::atomic::Ordering;
// self
use crate::{
	_prelude::*,
	flows::Broker,
	oauth::{self, AuthorizeRequest, RequestKind},
	obs::{self, Operation, OperationOutcome, OperationSpan},
};

impl Broker {
	/// Redirects the top-level document to the interactive login.
	///
	/// A fresh state and nonce are persisted together with the current address so the
	/// response can be matched after the page reloads. Does nothing while a login is already
	/// in progress.
	pub fn login(&self) -> Result<()> {
		const OPERATION: Operation = Operation::Login;

		let _span = OperationSpan::new(OPERATION, "login").entered();

		if self.login_in_progress() {
			return Ok(());
		}

		obs::record_operation_outcome(OPERATION, OperationOutcome::Attempt);

		let result = self.start_login();

		match &result {
			Ok(()) => obs::record_operation_outcome(OPERATION, OperationOutcome::Success),
			Err(_) => obs::record_operation_outcome(OPERATION, OperationOutcome::Failure),
		}

		result
	}

	/// Signs the user out: clears the cache and session, then redirects to the provider's
	/// logout endpoint.
	pub fn logout(&self) -> Result<()> {
		const OPERATION: Operation = Operation::Logout;

		let _span = OperationSpan::new(OPERATION, "logout").entered();

		obs::record_operation_outcome(OPERATION, OperationOutcome::Attempt);

		let result = self.clear_cache().and_then(|()| {
			let config = &self.inner.config;
			let mut url = config.logout_endpoint()?;

			url.query_pairs_mut()
				.append_pair("post_logout_redirect_uri", config.post_logout_redirect_uri.as_str());
			self.inner.session.write().reset();
			self.inner.navigator.redirect(&url);

			Ok(())
		});

		match &result {
			Ok(()) => obs::record_operation_outcome(OPERATION, OperationOutcome::Success),
			Err(_) => obs::record_operation_outcome(OPERATION, OperationOutcome::Failure),
		}

		result
	}

	fn start_login(&self) -> Result<()> {
		let inner = &self.inner;
		let state = oauth::random_state();
		let nonce = oauth::random_state();
		let mut request_url = inner.navigator.current_url();

		request_url.set_fragment(None);

		let url = AuthorizeRequest::new(RequestKind::Login, &state)
			.with_nonce(&nonce)
			.to_url(&inner.config, inner.strategy.as_ref())?;

		inner.store.begin_login(&state, &nonce, request_url.as_str())?;
		inner.login_in_progress.store(true, Ordering::SeqCst);
		inner.navigator.redirect(&url);

		Ok(())
	}
}
