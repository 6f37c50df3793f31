//! Crate-level error types shared across the cache, correlator, and flows.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem; fatal at initialization.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// A resource or client identifier failed validation.
	#[error(transparent)]
	Identifier(#[from] crate::auth::IdentifierError),
	/// An ID token returned by the provider could not be used.
	#[error(transparent)]
	IdToken(#[from] crate::auth::IdTokenError),

	/// No provider response arrived for a silent renewal within the configured window.
	#[error("Token renewal for `{resource}` timed out.")]
	RenewalTimeout {
		/// Resource whose renewal timed out.
		resource: String,
	},
	/// The provider session is gone; an interactive login redirect has been issued.
	#[error("Interaction is required to renew `{resource}`: {code}.")]
	InteractionRequired {
		/// Resource whose renewal failed.
		resource: String,
		/// Provider `error` code.
		code: String,
		/// Provider `error_description`, when supplied.
		description: Option<String>,
	},
	/// Provider reported an error for a renewal; surfaced verbatim.
	#[error("Provider rejected the request for `{resource}`: {code}.")]
	Provider {
		/// Resource whose renewal failed.
		resource: String,
		/// Category assigned by the provider strategy.
		kind: crate::provider::ProviderErrorKind,
		/// Provider `error` code.
		code: String,
		/// Provider `error_description`, when supplied.
		description: Option<String>,
	},
	/// No authenticated user is known; a login redirect is needed.
	#[error("User login is required.")]
	LoginRequired,
	/// No cached user information is available.
	#[error("User information is not available.")]
	UserUnavailable,
	/// The pending renewal was abandoned (logout or cache clear) before a response arrived.
	#[error("Token renewal for `{resource}` was cancelled.")]
	RenewalCancelled {
		/// Resource whose renewal was cancelled.
		resource: String,
	},
}
impl Error {
	/// Returns the provider `error` code carried by provider-originated failures.
	pub fn provider_code(&self) -> Option<&str> {
		match self {
			Self::InteractionRequired { code, .. } | Self::Provider { code, .. } => Some(code),
			_ => None,
		}
	}

	/// `true` when retrying later may succeed without user involvement.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Provider { kind: crate::provider::ProviderErrorKind::Transient, .. })
	}
}

/// Configuration and validation failures raised at initialization.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Client identifier was not supplied.
	#[error("Client configuration requires a client id.")]
	MissingClientId,
	/// Redirect URI was not supplied.
	#[error("Client configuration requires a redirect URI.")]
	MissingRedirectUri,
	/// A configured URL could not be parsed.
	#[error("Configured {field} URL is invalid.")]
	InvalidUrl {
		/// Which configuration field failed.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Provider instance must use HTTPS.
	#[error("The provider instance must use HTTPS: {url}.")]
	InsecureInstance {
		/// Instance URL that failed validation.
		url: String,
	},
	/// A duration setting must be strictly positive.
	#[error("The {field} duration must be positive.")]
	NonPositiveDuration {
		/// Which configuration field failed.
		field: &'static str,
	},
	/// A duration setting must not be negative.
	#[error("The {field} duration must not be negative.")]
	NegativeDuration {
		/// Which configuration field failed.
		field: &'static str,
	},
	/// A configured identifier is invalid.
	#[error("Configured {field} is invalid.")]
	InvalidIdentifier {
		/// Which configuration field failed.
		field: &'static str,
		/// Underlying validation failure.
		#[source]
		source: crate::auth::IdentifierError,
	},
	/// JSON configuration could not be parsed.
	#[error("Configuration JSON is malformed.")]
	Parse {
		/// Structured parsing failure including the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A host collaborator the broker cannot run without was not supplied.
	#[error("Broker requires a {name}.")]
	MissingCollaborator {
		/// Which collaborator is missing.
		name: &'static str,
	},
	/// The scheduler could not bind to an async runtime.
	#[error("No async runtime is available for the scheduler.")]
	RuntimeUnavailable,
}
