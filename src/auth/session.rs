//! Authenticated-user session derived from the token cache.

// self
use crate::{
	_prelude::*,
	auth::{IdTokenClaims, TokenSecret},
};

/// Snapshot of the signed-in user as seen by the token cache.
///
/// Exactly one session lives inside a [`Broker`](crate::flows::Broker); hosts receive clones.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
	/// Display name derived from the ID token.
	pub user_name: String,
	/// Every claim from the cached ID token.
	pub profile: serde_json::Map<String, serde_json::Value>,
	/// `true` while a valid login-resource token is cached.
	pub authenticated: bool,
	/// Last login or login-resource renewal error, if any.
	pub last_error: Option<String>,
	/// `true` when a user (ID token) is cached, even if the login token has expired.
	pub login_cached: bool,
	/// Login-resource token, when valid.
	pub token: Option<TokenSecret>,
}
impl Session {
	/// Builds a session from cached state.
	pub fn from_cache(
		claims: Option<&IdTokenClaims>,
		login_token: Option<TokenSecret>,
		last_error: Option<String>,
	) -> Self {
		let authenticated = login_token.as_ref().is_some_and(|token| !token.is_empty());

		match claims {
			Some(claims) => Self {
				user_name: claims.user_name().unwrap_or_default().to_owned(),
				profile: claims.raw.clone(),
				authenticated,
				last_error,
				login_cached: true,
				token: login_token,
			},
			None => Self { authenticated, last_error, ..Default::default() },
		}
	}

	/// Clears the session to its signed-out state.
	pub fn reset(&mut self) {
		*self = Self::default();
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	// self
	use super::*;

	#[test]
	fn session_reflects_cached_user_and_token() {
		let payload = URL_SAFE_NO_PAD.encode(r#"{"upn":"ada@contoso.com","oid":"o-1"}"#);
		let claims = IdTokenClaims::decode(&format!("h.{payload}.s"))
			.expect("Claims fixture should decode.");
		let session = Session::from_cache(Some(&claims), Some(TokenSecret::new("t")), None);

		assert!(session.authenticated);
		assert!(session.login_cached);
		assert_eq!(session.user_name, "ada@contoso.com");
		assert_eq!(session.profile.get("oid").and_then(|v| v.as_str()), Some("o-1"));

		let expired = Session::from_cache(Some(&claims), None, Some("login_required".into()));

		assert!(!expired.authenticated);
		assert!(expired.login_cached);
		assert_eq!(expired.last_error.as_deref(), Some("login_required"));
	}

	#[test]
	fn reset_signs_the_user_out() {
		let mut session = Session {
			user_name: "ada".into(),
			authenticated: true,
			login_cached: true,
			..Default::default()
		};

		session.reset();

		assert_eq!(session, Session::default());
	}
}
