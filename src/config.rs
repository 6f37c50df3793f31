//! Client configuration: provider instance, redirect targets, resource mapping, and timings.
//!
//! Configuration is validated once, when [`ClientConfigBuilder::build`] or
//! [`ClientConfig::from_json`] runs. Failures are [`ConfigError`]s and are fatal: a broker is
//! never constructed from an invalid configuration.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, ResourceId},
	error::ConfigError,
};

const DEFAULT_INSTANCE: &str = "https://login.microsoftonline.com/";
const DEFAULT_TENANT: &str = "common";
const DEFAULT_STORAGE_PREFIX: &str = "oauth2_implicit.";

/// Validated client configuration consumed by the broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
	/// OAuth client identifier.
	pub client_id: ClientId,
	/// Tenant path segment appended to the instance.
	pub tenant: String,
	/// Provider instance (authority host), always HTTPS and `/`-terminated.
	pub instance: Url,
	/// Redirect URI registered with the provider.
	pub redirect_uri: Url,
	/// Where the provider sends the browser after logout.
	pub post_logout_redirect_uri: Url,
	/// Resource whose token defines the authenticated session.
	pub login_resource: ResourceId,
	/// URL prefix → resource mapping used by [`ClientConfig::resource_for_endpoint`].
	pub endpoints: BTreeMap<String, ResourceId>,
	/// URL prefixes that never carry a token.
	pub anonymous_endpoints: Vec<String>,
	/// Extra query parameters appended to every authorization request.
	pub extra_query_parameters: Vec<(String, String)>,
	/// Skew subtracted from token expiry before a cached token is considered stale.
	pub expire_offset: Duration,
	/// How long before login-token expiry the background renewal fires.
	pub renewal_lead: Duration,
	/// How long a silent renewal may stay unanswered before it times out.
	pub renewal_timeout: Duration,
	/// Prefix for every durable storage key.
	pub storage_prefix: String,
}
impl ClientConfig {
	/// Default skew subtracted from token expiry.
	pub const DEFAULT_EXPIRE_OFFSET: Duration = Duration::seconds(5);
	/// Default lead time for the login-token renewal timer.
	pub const DEFAULT_RENEWAL_LEAD: Duration = Duration::seconds(300);
	/// Default window for a silent renewal to complete.
	pub const DEFAULT_RENEWAL_TIMEOUT: Duration = Duration::seconds(6);

	/// Creates a builder for the provided client id.
	pub fn builder(client_id: impl Into<String>) -> ClientConfigBuilder {
		ClientConfigBuilder::new(client_id)
	}

	/// Parses and validates a JSON configuration document.
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(json);
		let raw: RawClientConfig = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::Parse { source })?;

		raw.into_builder().build()
	}

	/// Provider authorization endpoint (`{instance}{tenant}/oauth2/authorize`).
	pub fn authorize_endpoint(&self) -> Result<Url, ConfigError> {
		self.authority_path("authorize")
	}

	/// Provider logout endpoint (`{instance}{tenant}/oauth2/logout`).
	pub fn logout_endpoint(&self) -> Result<Url, ConfigError> {
		self.authority_path("logout")
	}

	/// Resolves the resource that guards `endpoint`.
	///
	/// Configured prefixes win; anonymous prefixes map to nothing; remaining relative URLs
	/// and URLs on the application's own host map to the login resource.
	pub fn resource_for_endpoint(&self, endpoint: &str) -> Option<&ResourceId> {
		if let Some((_, resource)) = self
			.endpoints
			.iter()
			.filter(|(prefix, _)| endpoint.starts_with(prefix.as_str()))
			.max_by_key(|(prefix, _)| prefix.len())
		{
			return Some(resource);
		}
		if self.anonymous_endpoints.iter().any(|prefix| endpoint.starts_with(prefix.as_str())) {
			return None;
		}

		match Url::parse(endpoint) {
			Ok(url) if url.host_str() == self.redirect_uri.host_str() => Some(&self.login_resource),
			Ok(_) => None,
			Err(url::ParseError::RelativeUrlWithoutBase) => Some(&self.login_resource),
			Err(_) => None,
		}
	}

	fn authority_path(&self, leaf: &str) -> Result<Url, ConfigError> {
		self.instance
			.join(&format!("{}/oauth2/{leaf}", self.tenant))
			.map_err(|source| ConfigError::InvalidUrl { field: "instance", source })
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Clone, Debug)]
pub struct ClientConfigBuilder {
	client_id: String,
	tenant: Option<String>,
	instance: Option<String>,
	redirect_uri: Option<String>,
	post_logout_redirect_uri: Option<String>,
	login_resource: Option<String>,
	endpoints: Vec<(String, String)>,
	anonymous_endpoints: Vec<String>,
	extra_query_parameters: Vec<(String, String)>,
	expire_offset: Duration,
	renewal_lead: Duration,
	renewal_timeout: Duration,
	storage_prefix: Option<String>,
}
impl ClientConfigBuilder {
	fn new(client_id: impl Into<String>) -> Self {
		Self {
			client_id: client_id.into(),
			tenant: None,
			instance: None,
			redirect_uri: None,
			post_logout_redirect_uri: None,
			login_resource: None,
			endpoints: Vec::new(),
			anonymous_endpoints: Vec::new(),
			extra_query_parameters: Vec::new(),
			expire_offset: ClientConfig::DEFAULT_EXPIRE_OFFSET,
			renewal_lead: ClientConfig::DEFAULT_RENEWAL_LEAD,
			renewal_timeout: ClientConfig::DEFAULT_RENEWAL_TIMEOUT,
			storage_prefix: None,
		}
	}

	/// Sets the tenant path segment (defaults to `common`).
	pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
		self.tenant = Some(tenant.into());

		self
	}

	/// Sets the provider instance URL.
	pub fn instance(mut self, instance: impl Into<String>) -> Self {
		self.instance = Some(instance.into());

		self
	}

	/// Sets the redirect URI registered with the provider.
	pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
		self.redirect_uri = Some(uri.into());

		self
	}

	/// Sets the post-logout redirect URI (defaults to the redirect URI).
	pub fn post_logout_redirect_uri(mut self, uri: impl Into<String>) -> Self {
		self.post_logout_redirect_uri = Some(uri.into());

		self
	}

	/// Overrides the login resource (defaults to the client id).
	pub fn login_resource(mut self, resource: impl Into<String>) -> Self {
		self.login_resource = Some(resource.into());

		self
	}

	/// Maps a URL prefix to the resource whose token it requires.
	pub fn endpoint(mut self, prefix: impl Into<String>, resource: impl Into<String>) -> Self {
		self.endpoints.push((prefix.into(), resource.into()));

		self
	}

	/// Marks a URL prefix as never requiring a token.
	pub fn anonymous_endpoint(mut self, prefix: impl Into<String>) -> Self {
		self.anonymous_endpoints.push(prefix.into());

		self
	}

	/// Appends a query parameter to every authorization request.
	pub fn extra_query_parameter(
		mut self,
		name: impl Into<String>,
		value: impl Into<String>,
	) -> Self {
		self.extra_query_parameters.push((name.into(), value.into()));

		self
	}

	/// Overrides the expiry skew.
	pub fn expire_offset(mut self, offset: Duration) -> Self {
		self.expire_offset = offset;

		self
	}

	/// Overrides the login-token renewal lead.
	pub fn renewal_lead(mut self, lead: Duration) -> Self {
		self.renewal_lead = lead;

		self
	}

	/// Overrides the silent renewal timeout.
	pub fn renewal_timeout(mut self, timeout: Duration) -> Self {
		self.renewal_timeout = timeout;

		self
	}

	/// Overrides the durable storage key prefix.
	pub fn storage_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.storage_prefix = Some(prefix.into());

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingClientId);
		}

		let client_id = ClientId::new(&self.client_id)
			.map_err(|source| ConfigError::InvalidIdentifier { field: "client_id", source })?;
		let instance = parse_url("instance", self.instance.as_deref().unwrap_or(DEFAULT_INSTANCE))?;
		let instance = normalize_instance(instance)?;
		let redirect_uri = self.redirect_uri.as_deref().ok_or(ConfigError::MissingRedirectUri)?;
		let redirect_uri = parse_url("redirect_uri", redirect_uri)?;
		let post_logout_redirect_uri = match self.post_logout_redirect_uri.as_deref() {
			Some(uri) => parse_url("post_logout_redirect_uri", uri)?,
			None => redirect_uri.clone(),
		};
		let login_resource = self.login_resource.as_deref().unwrap_or(client_id.as_ref());
		let login_resource = ResourceId::new(login_resource).map_err(|source| {
			ConfigError::InvalidIdentifier { field: "login_resource", source }
		})?;
		let endpoints = self
			.endpoints
			.into_iter()
			.map(|(prefix, resource)| {
				ResourceId::new(resource)
					.map(|resource| (prefix, resource))
					.map_err(|source| ConfigError::InvalidIdentifier { field: "endpoints", source })
			})
			.collect::<Result<BTreeMap<_, _>, _>>()?;

		if self.expire_offset.is_negative() {
			return Err(ConfigError::NegativeDuration { field: "expire_offset" });
		}
		ensure_positive("renewal_lead", self.renewal_lead)?;
		ensure_positive("renewal_timeout", self.renewal_timeout)?;

		Ok(ClientConfig {
			client_id,
			tenant: self.tenant.unwrap_or_else(|| DEFAULT_TENANT.into()),
			instance,
			redirect_uri,
			post_logout_redirect_uri,
			login_resource,
			endpoints,
			anonymous_endpoints: self.anonymous_endpoints,
			extra_query_parameters: self.extra_query_parameters,
			expire_offset: self.expire_offset,
			renewal_lead: self.renewal_lead,
			renewal_timeout: self.renewal_timeout,
			storage_prefix: self.storage_prefix.unwrap_or_else(|| DEFAULT_STORAGE_PREFIX.into()),
		})
	}
}

/// JSON shape accepted by [`ClientConfig::from_json`]; durations are whole seconds.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClientConfig {
	client_id: String,
	redirect_uri: String,
	#[serde(default)]
	tenant: Option<String>,
	#[serde(default)]
	instance: Option<String>,
	#[serde(default)]
	post_logout_redirect_uri: Option<String>,
	#[serde(default)]
	login_resource: Option<String>,
	#[serde(default)]
	endpoints: BTreeMap<String, String>,
	#[serde(default)]
	anonymous_endpoints: Vec<String>,
	#[serde(default)]
	extra_query_parameters: BTreeMap<String, String>,
	#[serde(default)]
	expire_offset_seconds: Option<i64>,
	#[serde(default)]
	renewal_lead_seconds: Option<i64>,
	#[serde(default)]
	renewal_timeout_seconds: Option<i64>,
	#[serde(default)]
	storage_prefix: Option<String>,
}
impl RawClientConfig {
	fn into_builder(self) -> ClientConfigBuilder {
		let mut builder = ClientConfig::builder(self.client_id).redirect_uri(self.redirect_uri);

		if let Some(tenant) = self.tenant {
			builder = builder.tenant(tenant);
		}
		if let Some(instance) = self.instance {
			builder = builder.instance(instance);
		}
		if let Some(uri) = self.post_logout_redirect_uri {
			builder = builder.post_logout_redirect_uri(uri);
		}
		if let Some(resource) = self.login_resource {
			builder = builder.login_resource(resource);
		}
		for (prefix, resource) in self.endpoints {
			builder = builder.endpoint(prefix, resource);
		}
		for prefix in self.anonymous_endpoints {
			builder = builder.anonymous_endpoint(prefix);
		}
		for (name, value) in self.extra_query_parameters {
			builder = builder.extra_query_parameter(name, value);
		}
		if let Some(seconds) = self.expire_offset_seconds {
			builder = builder.expire_offset(Duration::seconds(seconds));
		}
		if let Some(seconds) = self.renewal_lead_seconds {
			builder = builder.renewal_lead(Duration::seconds(seconds));
		}
		if let Some(seconds) = self.renewal_timeout_seconds {
			builder = builder.renewal_timeout(Duration::seconds(seconds));
		}
		if let Some(prefix) = self.storage_prefix {
			builder = builder.storage_prefix(prefix);
		}

		builder
	}
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
	Url::parse(value).map_err(|source| ConfigError::InvalidUrl { field, source })
}

fn normalize_instance(mut instance: Url) -> Result<Url, ConfigError> {
	if instance.scheme() != "https" {
		return Err(ConfigError::InsecureInstance { url: instance.to_string() });
	}
	if !instance.path().ends_with('/') {
		let path = format!("{}/", instance.path());

		instance.set_path(&path);
	}

	Ok(instance)
}

fn ensure_positive(field: &'static str, value: Duration) -> Result<(), ConfigError> {
	if value.is_positive() { Ok(()) } else { Err(ConfigError::NonPositiveDuration { field }) }
}
