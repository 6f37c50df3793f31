//! Implicit-flow OAuth 2.0 token cache for single-page hosts: multi-resource caching,
//! hidden-frame silent renewal, and correlated provider callbacks in one crate.
//!
//! The [`flows::Broker`] is the explicit context object a host owns. It consults the
//! [`cache::TokenStore`], mints correlation states through the
//! [`correlate::RequestCorrelator`], drives hidden-frame or top-level navigation through a
//! [`host::Navigator`], and keeps the login token fresh with a cancellable timer on a
//! [`host::Scheduler`]. Provider responses are fed back by the host through
//! [`flows::Broker::handle_callback`].

#![deny(clippy::all, missing_docs)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod correlate;
pub mod error;
pub mod flows;
pub mod host;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod store;
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and harness helpers for integration tests.

	pub use crate::_prelude::*;

	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	// self
	use crate::{
		auth::TokenSecret,
		cache::TokenStore,
		config::ClientConfig,
		flows::Broker,
		host::{ManualClock, ManualScheduler, RecordingNavigator},
		store::MemoryStorage,
	};

	/// Client identifier used by [`test_config`].
	pub const TEST_CLIENT_ID: &str = "client-spa";
	/// Redirect URI used by [`test_config`].
	pub const TEST_REDIRECT_URI: &str = "https://app.example.com/";
	/// User principal name carried by [`user_id_token`].
	pub const TEST_USER: &str = "ada@contoso.com";

	/// Deterministic collaborators wired into a [`Broker`] by [`build_test_broker`].
	#[derive(Clone, Debug)]
	pub struct TestHarness {
		/// Broker under test.
		pub broker: Broker,
		/// Durable storage shared with the broker.
		pub storage: Arc<MemoryStorage>,
		/// Navigator recording every frame load, redirect, and fragment strip.
		pub navigator: Arc<RecordingNavigator>,
		/// Clock shared by the broker and the scheduler.
		pub clock: ManualClock,
		/// Host-driven scheduler; advance it to fire timers.
		pub scheduler: Arc<ManualScheduler>,
	}

	/// Fixed starting instant used by the harness clock.
	pub fn test_epoch() -> OffsetDateTime {
		time::macros::datetime!(2025-06-01 12:00 UTC)
	}

	/// Builds the configuration shared across integration tests.
	pub fn test_config() -> ClientConfig {
		ClientConfig::builder(TEST_CLIENT_ID)
			.tenant("contoso.onmicrosoft.com")
			.redirect_uri(TEST_REDIRECT_URI)
			.endpoint("https://graph.example.com/", "https://graph.example.com")
			.anonymous_endpoint("https://graph.example.com/public")
			.build()
			.expect("Test client configuration should be valid.")
	}

	/// Builds a broker around pre-populated storage, using the provided configuration.
	pub fn build_test_broker_with(
		config: ClientConfig,
		storage: Arc<MemoryStorage>,
	) -> TestHarness {
		let current = Url::parse(TEST_REDIRECT_URI).expect("Test redirect URI should parse.");
		let navigator = Arc::new(RecordingNavigator::new(current));
		let clock = ManualClock::new(test_epoch());
		let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
		let broker = Broker::builder(config)
			.storage(storage.clone())
			.navigator(navigator.clone())
			.scheduler(scheduler.clone())
			.clock(Arc::new(clock.clone()))
			.build()
			.expect("Test broker should build successfully.");

		TestHarness { broker, storage, navigator, clock, scheduler }
	}

	/// Builds a broker with empty storage and [`test_config`].
	pub fn build_test_broker() -> TestHarness {
		build_test_broker_with(test_config(), Arc::new(MemoryStorage::default()))
	}

	/// Encodes an unsigned JWT carrying the provided claims.
	pub fn fake_id_token(claims: &serde_json::Value) -> String {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
		let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

		format!("{header}.{payload}.")
	}

	/// Encodes an ID token for [`TEST_USER`] issued to [`TEST_CLIENT_ID`].
	pub fn user_id_token(nonce: Option<&str>, expires_at: OffsetDateTime) -> String {
		let mut claims = serde_json::json!({
			"aud": TEST_CLIENT_ID,
			"sub": "user-1",
			"upn": TEST_USER,
			"exp": expires_at.unix_timestamp(),
		});

		if let Some(nonce) = nonce {
			claims["nonce"] = nonce.into();
		}

		fake_id_token(&claims)
	}

	/// Writes a signed-in user whose login token expires at `expires_at` into `storage`.
	pub fn seed_signed_in_user(
		config: &ClientConfig,
		storage: Arc<MemoryStorage>,
		expires_at: OffsetDateTime,
	) {
		let store = TokenStore::new(storage, config.storage_prefix.clone(), config.expire_offset);
		let id_token = TokenSecret::new(user_id_token(None, expires_at));

		store.set_id_token(&id_token).expect("Seeding the ID token should succeed.");
		store
			.put(&config.login_resource, id_token, expires_at)
			.expect("Seeding the login token should succeed.");
	}

	/// Extracts a query parameter from a recorded navigation URL.
	pub fn query_param(url: &Url, name: &str) -> Option<String> {
		url.query_pairs().find(|(key, _)| key == name).map(|(_, value)| value.into_owned())
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::{Arc, Weak},
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
pub use url;
