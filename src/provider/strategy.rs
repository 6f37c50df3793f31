//! Provider strategy hooks that customize implicit-flow requests.
//!
//! Implementations decorate outgoing authorization requests and classify the `error` codes a
//! provider puts in the response fragment, without tying the broker to a particular provider.

// self
use crate::{_prelude::*, oauth::RequestKind};

/// Strategy hook that allows providers to decorate requests and classify errors.
///
/// Implementors are required to be `Send + Sync`. Override only what you need:
/// `augment_authorize_request` has a default no-op implementation.
pub trait ProviderStrategy: Send + Sync {
	/// Maps a provider error response into the broker taxonomy.
	fn classify_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;

	/// Gives providers a chance to add query parameters before the navigation starts.
	///
	/// Parameters already present in `params` (resource, nonce, hints) may be overwritten.
	fn augment_authorize_request(
		&self,
		_kind: RequestKind,
		_params: &mut BTreeMap<String, String>,
	) {
	}
}

/// Canonical provider error categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// The provider needs the user in front of it (sign-in, consent, account picker).
	InteractionRequired,
	/// The user or an administrator refused the request.
	AccessDenied,
	/// Failure is temporary on the provider side.
	Transient,
	/// Anything else; surfaced to the caller verbatim.
	Other,
}
impl ProviderErrorKind {
	/// `true` when the failure means the provider session needs user interaction.
	pub const fn requires_interaction(self) -> bool {
		matches!(self, Self::InteractionRequired)
	}
}

/// Context passed to provider strategies when classifying an error response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Request that produced the error.
	pub kind: RequestKind,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: String,
	/// Provider-supplied OAuth `error_description` field, truncated for logging.
	pub error_description: Option<String>,
}
impl ProviderErrorContext {
	const DESCRIPTION_PREVIEW_LIMIT: usize = 256;

	/// Creates a new context for the provided request kind and `error` code.
	pub fn new(kind: RequestKind, oauth_error: impl Into<String>) -> Self {
		Self { kind, oauth_error: oauth_error.into(), error_description: None }
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(truncate_preview(description.into()));

		self
	}
}

/// Default strategy for OIDC-style providers.
///
/// It prioritizes the structured `error` code, then falls back to provider error codes
/// embedded in `error_description`.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-provider-strategy")
	}
}
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		match_exact_value(&ctx.oauth_error)
			.or_else(|| classify_description(ctx.error_description.as_deref()))
			.unwrap_or(ProviderErrorKind::Other)
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= ProviderErrorContext::DESCRIPTION_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = String::new();

	for (idx, ch) in body.chars().enumerate() {
		if idx >= ProviderErrorContext::DESCRIPTION_PREVIEW_LIMIT {
			buf.push('…');

			break;
		}
		buf.push(ch);
	}

	buf
}

fn match_exact_value(value: &str) -> Option<ProviderErrorKind> {
	if value.eq_ignore_ascii_case("interaction_required")
		|| value.eq_ignore_ascii_case("login_required")
		|| value.eq_ignore_ascii_case("consent_required")
		|| value.eq_ignore_ascii_case("account_selection_required")
	{
		Some(ProviderErrorKind::InteractionRequired)
	} else if value.eq_ignore_ascii_case("access_denied")
		|| value.eq_ignore_ascii_case("unauthorized_client")
	{
		Some(ProviderErrorKind::AccessDenied)
	} else if value.eq_ignore_ascii_case("temporarily_unavailable")
		|| value.eq_ignore_ascii_case("server_error")
	{
		Some(ProviderErrorKind::Transient)
	} else {
		None
	}
}

fn classify_description(description: Option<&str>) -> Option<ProviderErrorKind> {
	let lowered = description?.to_ascii_lowercase();

	match lowered.as_str() {
		// Azure AD: no signed-in user (50058), consent missing (65001), MFA needed (50076/50079).
		text if ["aadsts50058", "aadsts65001", "aadsts50076", "aadsts50079"]
			.iter()
			.any(|code| text.contains(code)) =>
			Some(ProviderErrorKind::InteractionRequired),
		text if text.contains("interaction_required") || text.contains("login_required") =>
			Some(ProviderErrorKind::InteractionRequired),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn classify(error: &str, description: Option<&str>) -> ProviderErrorKind {
		let mut ctx = ProviderErrorContext::new(RequestKind::RenewToken, error);

		if let Some(description) = description {
			ctx = ctx.with_error_description(description);
		}

		DefaultProviderStrategy.classify_error(&ctx)
	}

	#[test]
	fn interaction_codes_are_recognized() {
		let codes = [
			"interaction_required",
			"login_required",
			"consent_required",
			"account_selection_required",
		];

		for code in codes {
			assert_eq!(classify(code, None), ProviderErrorKind::InteractionRequired, "{code}");
		}

		assert_eq!(classify("LOGIN_REQUIRED", None), ProviderErrorKind::InteractionRequired);
	}

	#[test]
	fn description_codes_refine_unknown_errors() {
		assert_eq!(
			classify("invalid_request", Some("AADSTS50058: A silent sign-in request was sent.")),
			ProviderErrorKind::InteractionRequired
		);
		assert_eq!(
			classify("invalid_resource", Some("No such resource.")),
			ProviderErrorKind::Other
		);
		assert_eq!(classify("access_denied", None), ProviderErrorKind::AccessDenied);
		assert_eq!(classify("server_error", None), ProviderErrorKind::Transient);
	}

	#[test]
	fn long_descriptions_are_truncated() {
		let ctx = ProviderErrorContext::new(RequestKind::Login, "server_error")
			.with_error_description("x".repeat(400));
		let description = ctx.error_description.expect("Description should be kept.");

		assert_eq!(
			description.chars().count(),
			ProviderErrorContext::DESCRIPTION_PREVIEW_LIMIT + 1
		);
		assert!(description.ends_with('…'));
	}
}
