//! Implicit-flow wire format: authorization URLs going out, fragment responses coming in.

// crates.io
use oauth2::{
	AuthUrl, ClientId as OAuthClientId, CsrfToken, RedirectUrl, ResponseType, Scope,
	basic::BasicClient,
};
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	auth::{ResourceId, TokenSecret},
	config::ClientConfig,
	error::ConfigError,
	provider::ProviderStrategy,
};

const STATE_LEN: usize = 32;
const DEFAULT_EXPIRES_IN: Duration = Duration::seconds(3600);
const MAX_EXPIRES_IN: Duration = Duration::days(1);

/// What an authorization request asks the provider for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
	/// Interactive top-level login returning an ID token.
	Login,
	/// Silent access-token renewal for a resource.
	RenewToken,
	/// Silent ID-token renewal (the resource is the client itself).
	RenewIdToken,
}
impl RequestKind {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestKind::Login => "login",
			RequestKind::RenewToken => "renew_token",
			RequestKind::RenewIdToken => "renew_id_token",
		}
	}

	/// OAuth `response_type` sent with the request.
	pub const fn response_type(self) -> &'static str {
		match self {
			RequestKind::Login | RequestKind::RenewIdToken => "id_token",
			RequestKind::RenewToken => "token",
		}
	}

	/// `true` for the non-interactive renewal kinds.
	pub const fn is_silent(self) -> bool {
		!matches!(self, RequestKind::Login)
	}
}
impl Display for RequestKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Parameters of one navigation to the provider authorization endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizeRequest {
	/// Request kind; selects the `response_type`.
	pub kind: RequestKind,
	/// Correlation state round-tripped by the provider.
	pub state: String,
	/// Resource (audience) the token is requested for.
	pub resource: Option<ResourceId>,
	/// Nonce bound into the returned ID token.
	pub nonce: Option<String>,
	/// Cached user, passed as `login_hint`.
	pub login_hint: Option<String>,
	/// Tenant domain of the cached user, passed as `domain_hint`.
	pub domain_hint: Option<String>,
}
impl AuthorizeRequest {
	/// Creates a request with no resource or hints.
	pub fn new(kind: RequestKind, state: impl Into<String>) -> Self {
		Self {
			kind,
			state: state.into(),
			resource: None,
			nonce: None,
			login_hint: None,
			domain_hint: None,
		}
	}

	/// Sets the resource the token is requested for.
	pub fn with_resource(mut self, resource: ResourceId) -> Self {
		self.resource = Some(resource);

		self
	}

	/// Sets the nonce bound into the ID token.
	pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
		self.nonce = Some(nonce.into());

		self
	}

	/// Adds the `login_hint` and `domain_hint` derived from the cached user.
	pub fn with_user_hints(mut self, login_hint: Option<&str>, domain_hint: Option<&str>) -> Self {
		self.login_hint = login_hint.map(str::to_owned);
		self.domain_hint = domain_hint.map(str::to_owned);

		self
	}

	/// Renders the provider navigation URL.
	///
	/// Silent kinds carry `prompt=none`. Configured extra query parameters are appended to every
	/// kind, then the strategy gets the final say.
	pub fn to_url(
		&self,
		config: &ClientConfig,
		strategy: &dyn ProviderStrategy,
	) -> Result<Url, ConfigError> {
		let client = BasicClient::new(OAuthClientId::new(config.client_id.to_string()))
			.set_auth_uri(AuthUrl::from_url(config.authorize_endpoint()?))
			.set_redirect_uri(RedirectUrl::from_url(config.redirect_uri.clone()));
		let response_type = ResponseType::new(self.kind.response_type().into());
		let params = self.extra_params(config, strategy);
		let state = self.state.clone();
		let mut request = client
			.authorize_url(move || CsrfToken::new(state))
			.set_response_type(&response_type);

		if matches!(self.kind, RequestKind::Login | RequestKind::RenewIdToken) {
			request = request.add_scope(Scope::new("openid".into()));
		}
		for (name, value) in &params {
			request = request.add_extra_param(name.as_str(), value.as_str());
		}

		let (url, _) = request.url();

		Ok(url)
	}

	fn extra_params(
		&self,
		config: &ClientConfig,
		strategy: &dyn ProviderStrategy,
	) -> BTreeMap<String, String> {
		let mut params = BTreeMap::new();

		params.insert("response_mode".into(), "fragment".into());

		if let Some(resource) = &self.resource {
			params.insert("resource".into(), resource.to_string());
		}
		if let Some(nonce) = &self.nonce {
			params.insert("nonce".into(), nonce.clone());
		}
		if self.kind.is_silent() {
			params.insert("prompt".into(), "none".into());

			if let Some(hint) = &self.login_hint {
				params.insert("login_hint".into(), hint.clone());
			}
			if let Some(hint) = &self.domain_hint {
				params.insert("domain_hint".into(), hint.clone());
			}
		}
		for (name, value) in &config.extra_query_parameters {
			params.insert(name.clone(), value.clone());
		}

		strategy.augment_authorize_request(self.kind, &mut params);

		params
	}
}

/// Provider response carried in a redirect fragment (or relayed by a frame).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderResponse {
	/// Echoed correlation state.
	pub state: Option<String>,
	/// Access token for a resource.
	pub access_token: Option<TokenSecret>,
	/// ID token for the user.
	pub id_token: Option<TokenSecret>,
	/// Raw `expires_in` value, in seconds.
	pub expires_in: Option<String>,
	/// OAuth `error` code.
	pub error: Option<String>,
	/// OAuth `error_description`.
	pub error_description: Option<String>,
}
impl ProviderResponse {
	/// Parses a URL fragment (with or without the leading `#`).
	///
	/// Returns `None` when the fragment is not a provider response, i.e. it has none of
	/// `access_token`, `id_token`, or `error`.
	pub fn from_fragment(fragment: &str) -> Option<Self> {
		let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
		let mut response = Self::default();

		for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
			let value = value.into_owned();

			match key.as_ref() {
				"state" => response.state = Some(value),
				"access_token" => response.access_token = Some(TokenSecret::new(value)),
				"id_token" => response.id_token = Some(TokenSecret::new(value)),
				"expires_in" => response.expires_in = Some(value),
				"error" => response.error = Some(value),
				"error_description" => response.error_description = Some(value),
				_ => {},
			}
		}

		response.is_callback().then_some(response)
	}

	/// Parses the fragment of `url`.
	pub fn from_url(url: &Url) -> Option<Self> {
		url.fragment().and_then(Self::from_fragment)
	}

	/// `true` when the response carries a token or an error.
	pub fn is_callback(&self) -> bool {
		self.access_token.is_some() || self.id_token.is_some() || self.error.is_some()
	}

	/// Token lifetime; absent or unparsable values fall back to one hour.
	///
	/// Lifetimes are capped at one day.
	pub fn expires_in(&self) -> Duration {
		self.expires_in
			.as_deref()
			.and_then(|raw| raw.trim().parse::<i64>().ok())
			.filter(|seconds| *seconds > 0)
			.map(|seconds| Duration::seconds(seconds).min(MAX_EXPIRES_IN))
			.unwrap_or(DEFAULT_EXPIRES_IN)
	}
}

/// Quick check for hosts deciding whether to route a fragment to the broker.
pub fn is_callback(fragment: &str) -> bool {
	ProviderResponse::from_fragment(fragment).is_some()
}

/// Mints an unpredictable correlation state or nonce.
pub fn random_state() -> String {
	rand::rng().sample_iter(Alphanumeric).take(STATE_LEN).map(char::from).collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::provider::DefaultProviderStrategy;

	fn config() -> ClientConfig {
		ClientConfig::builder("client-spa")
			.tenant("contoso")
			.redirect_uri("https://app.example.com/")
			.extra_query_parameter("slice", "testslice")
			.build()
			.expect("Configuration fixture should build.")
	}

	fn params(url: &Url) -> BTreeMap<String, String> {
		url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect()
	}

	#[test]
	fn silent_token_request_carries_prompt_and_hints() {
		let request = AuthorizeRequest::new(RequestKind::RenewToken, "state-1")
			.with_resource(ResourceId::new("https://graph.example.com").expect("Resource fixture."))
			.with_user_hints(Some("ada@contoso.com"), Some("contoso.com"));
		let url =
			request.to_url(&config(), &DefaultProviderStrategy).expect("URL should render.");
		let params = params(&url);

		assert!(
			url.as_str().starts_with("https://login.microsoftonline.com/contoso/oauth2/authorize?")
		);
		assert_eq!(params["response_type"], "token");
		assert_eq!(params["client_id"], "client-spa");
		assert_eq!(params["redirect_uri"], "https://app.example.com/");
		assert_eq!(params["state"], "state-1");
		assert_eq!(params["resource"], "https://graph.example.com");
		assert_eq!(params["response_mode"], "fragment");
		assert_eq!(params["prompt"], "none");
		assert_eq!(params["login_hint"], "ada@contoso.com");
		assert_eq!(params["domain_hint"], "contoso.com");
		assert_eq!(params["slice"], "testslice");
		assert!(!params.contains_key("nonce"));
	}

	#[test]
	fn login_request_asks_for_id_token_interactively() {
		let url = AuthorizeRequest::new(RequestKind::Login, "state-2")
			.with_nonce("nonce-2")
			.with_user_hints(Some("ada@contoso.com"), None)
			.to_url(&config(), &DefaultProviderStrategy)
			.expect("URL should render.");
		let params = params(&url);

		assert_eq!(params["response_type"], "id_token");
		assert_eq!(params["nonce"], "nonce-2");
		assert_eq!(params["scope"], "openid");
		assert!(!params.contains_key("prompt"));
		assert!(!params.contains_key("login_hint"));
	}

	#[test]
	fn fragment_parsing_recognizes_tokens_and_errors() {
		let response = ProviderResponse::from_fragment("#access_token=T2&state=C&expires_in=600")
			.expect("Token fragment should parse.");

		assert_eq!(response.state.as_deref(), Some("C"));
		assert_eq!(response.access_token.as_ref().map(TokenSecret::expose), Some("T2"));
		assert_eq!(response.expires_in(), Duration::seconds(600));

		let error = ProviderResponse::from_fragment(
			"error=interaction_required&error_description=AADSTS50058%3A+no+user&state=C",
		)
		.expect("Error fragment should parse.");

		assert_eq!(error.error.as_deref(), Some("interaction_required"));
		assert_eq!(error.error_description.as_deref(), Some("AADSTS50058: no user"));
		assert_eq!(error.expires_in(), Duration::seconds(3600));
		assert!(!is_callback("#/dashboard"));
		assert!(!is_callback(""));
	}

	#[test]
	fn oversized_lifetimes_are_capped() {
		let response = ProviderResponse::from_fragment(
			"access_token=T&state=C&expires_in=9223372036854775807",
		)
		.expect("Token fragment should parse.");

		assert_eq!(response.expires_in(), Duration::days(1));

		let negative = ProviderResponse::from_fragment("access_token=T&state=C&expires_in=-5")
			.expect("Token fragment should parse.");

		assert_eq!(negative.expires_in(), Duration::seconds(3600));
	}

	#[test]
	fn random_states_are_unique_and_alphanumeric() {
		let a = random_state();
		let b = random_state();

		assert_eq!(a.len(), STATE_LEN);
		assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
		assert_ne!(a, b);
	}
}
