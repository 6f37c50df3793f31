//! ID-token payload decoding.
//!
//! Tokens are decoded, not verified: the signature is the provider's concern and the token
//! only reaches this crate through the redirect URI it registered. The nonce check in the
//! callback dispatcher binds a token to the login or renewal request that asked for it.

// crates.io
use base64::{
	Engine as _,
	engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
// self
use crate::_prelude::*;

/// Failures raised while decoding an ID token.
#[derive(Debug, ThisError)]
pub enum IdTokenError {
	/// Token does not have the three dot-separated JWT segments.
	#[error("ID token is not a three-part JWT.")]
	Malformed,
	/// Payload segment is not valid base64url.
	#[error("ID token payload is not valid base64url.")]
	Encoding(#[from] base64::DecodeError),
	/// Payload JSON does not match the expected claim shapes.
	#[error("ID token payload is malformed.")]
	Payload(#[from] serde_path_to_error::Error<serde_json::Error>),
	/// The `nonce` claim does not match the nonce sent with the request.
	#[error("ID token nonce does not match the request.")]
	NonceMismatch,
	/// Audience claim does not name this client.
	#[error("ID token audience `{audience}` does not match the client id.")]
	AudienceMismatch {
		/// Audience found in the token.
		audience: String,
	},
}

/// Claims read from an ID token payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
	/// Subject identifier.
	#[serde(default)]
	pub sub: Option<String>,
	/// Audience (client id) the token was issued to.
	#[serde(default)]
	pub aud: Option<String>,
	/// Nonce echoed from the authorization request.
	#[serde(default)]
	pub nonce: Option<String>,
	/// Expiry as Unix seconds.
	#[serde(default)]
	pub exp: Option<i64>,
	/// User principal name.
	#[serde(default)]
	pub upn: Option<String>,
	/// E-mail address.
	#[serde(default)]
	pub email: Option<String>,
	/// Preferred user name.
	#[serde(default)]
	pub preferred_username: Option<String>,
	/// Every claim in the payload, including the typed ones above.
	#[serde(skip)]
	pub raw: serde_json::Map<String, serde_json::Value>,
}
impl IdTokenClaims {
	/// Decodes the payload segment of a compact JWT.
	pub fn decode(id_token: &str) -> Result<Self, IdTokenError> {
		let mut parts = id_token.split('.');
		let (Some(_header), Some(payload), Some(_signature), None) =
			(parts.next(), parts.next(), parts.next(), parts.next())
		else {
			return Err(IdTokenError::Malformed);
		};
		let bytes = decode_segment(payload)?;
		let mut de = serde_json::Deserializer::from_slice(&bytes);
		let raw: serde_json::Map<String, serde_json::Value> =
			serde_path_to_error::deserialize(&mut de)?;
		let mut de = serde_json::Deserializer::from_slice(&bytes);
		let mut claims: Self = serde_path_to_error::deserialize(&mut de)?;

		claims.raw = raw;

		Ok(claims)
	}

	/// Display name for the user: `upn`, then `email`, `preferred_username`, and `sub`.
	pub fn user_name(&self) -> Option<&str> {
		self.upn
			.as_deref()
			.or(self.email.as_deref())
			.or(self.preferred_username.as_deref())
			.or(self.sub.as_deref())
	}

	/// Expiry instant derived from the `exp` claim.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.exp.and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok())
	}

	/// Domain part of the user name, used as a `domain_hint` on silent renewals.
	pub fn domain_hint(&self) -> Option<&str> {
		self.user_name().and_then(|name| name.rsplit_once('@')).map(|(_, domain)| domain)
	}

	/// Fails unless the token's nonce equals `expected`.
	pub fn verify_nonce(&self, expected: Option<&str>) -> Result<(), IdTokenError> {
		match (self.nonce.as_deref(), expected) {
			(Some(actual), Some(expected)) if actual == expected => Ok(()),
			_ => Err(IdTokenError::NonceMismatch),
		}
	}

	/// Fails when the token carries an audience other than `client_id`.
	pub fn verify_audience(&self, client_id: &str) -> Result<(), IdTokenError> {
		match self.aud.as_deref() {
			Some(audience) if audience != client_id =>
				Err(IdTokenError::AudienceMismatch { audience: audience.to_owned() }),
			_ => Ok(()),
		}
	}
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, IdTokenError> {
	if segment.ends_with('=') {
		Ok(URL_SAFE.decode(segment)?)
	} else {
		Ok(URL_SAFE_NO_PAD.decode(segment)?)
	}
}
