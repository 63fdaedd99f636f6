//! Broker configuration loaded from JSON documents or environment variables.
//!
//! Environment loading reads `IDP_BROKER_PROVIDERS` (comma-separated provider ids) and,
//! for each provider, variables prefixed with [`ProviderId::env_prefix`]:
//!
//! | Variable | Required | Meaning |
//! |----------|----------|---------|
//! | `<PREFIX>_CLIENT_ID` | yes | OAuth client identifier |
//! | `<PREFIX>_CLIENT_SECRET` | unless `_PKCE` | Client secret |
//! | `<PREFIX>_REDIRECT_URL` | yes | Callback URL registered with the provider |
//! | `<PREFIX>_AUTH_URL` | yes | Authorization endpoint |
//! | `<PREFIX>_TOKEN_URL` | yes | Token endpoint |
//! | `<PREFIX>_JWKS_URL` | yes | JWKS endpoint |
//! | `<PREFIX>_SCOPES` | no | Space- or comma-separated scopes |
//! | `<PREFIX>_AUDIENCE` | no | Audience appended to the authorization URL |
//! | `<PREFIX>_LOGOUT_URL` | no | Logout endpoint |
//! | `<PREFIX>_PKCE` | no | Send a PKCE challenge (`true`/`false`) |
//! | `<PREFIX>_VERIFY_ACCESS_TOKEN` | no | Verify the access token as a JWT |
//! | `<PREFIX>_NEXT` | no | Provider to chain to after a successful login |
//!
//! Broker knobs come from `IDP_BROKER_REQUEST_TIMEOUT_SECS`, `IDP_BROKER_SESSION_TTL_SECS`,
//! and `IDP_BROKER_CLOCK_LEEWAY_SECS`.

// std
use std::{collections::HashSet, time::Duration as StdDuration};
// self
use crate::{
	_prelude::*,
	auth::{ProviderId, ScopeSet},
	error::ConfigError,
	flows::{Broker, LoginChain},
	http::ProviderHttpClient,
	oauth::TransportErrorMapper,
	provider::{
		ClientAuthMethod, DefaultProviderStrategy, ProviderDescriptor, ProviderQuirks,
		ProviderStrategy,
	},
	session::SessionStore,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Environment variable listing the configured providers.
pub const PROVIDERS_ENV: &str = "IDP_BROKER_PROVIDERS";

const REQUEST_TIMEOUT_ENV: &str = "IDP_BROKER_REQUEST_TIMEOUT_SECS";
const SESSION_TTL_ENV: &str = "IDP_BROKER_SESSION_TTL_SECS";
const CLOCK_LEEWAY_ENV: &str = "IDP_BROKER_CLOCK_LEEWAY_SECS";
const DEFAULT_SCOPES: [&str; 3] = ["openid", "profile", "email"];

/// Aggregated broker configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
	/// Provider descriptors, one per identity provider.
	pub providers: Vec<ProviderDescriptor>,
	/// Per-request timeout for every provider call.
	#[serde(default = "default_request_timeout_secs")]
	pub request_timeout_secs: u32,
	/// Lifetime of a pending login.
	#[serde(default = "default_session_ttl_secs")]
	pub session_ttl_secs: u32,
	/// Clock skew tolerated when checking `exp` and `nbf`.
	#[serde(default)]
	pub clock_leeway_secs: u32,
	/// Provider continuations (`provider → next provider`).
	#[serde(default)]
	pub chain: BTreeMap<ProviderId, ProviderId>,
}
impl BrokerConfig {
	/// Parses and validates a JSON configuration document.
	pub fn from_json(document: &str) -> Result<Self> {
		let mut deserializer = serde_json::Deserializer::from_str(document);
		let config: Self = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| ConfigError::Parse { source })?;

		config.validate()?;

		Ok(config)
	}

	/// Loads the configuration from the process environment.
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Loads the configuration through `lookup`, which maps variable names to values.
	pub fn from_lookup<F>(lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let ids = required(&lookup, PROVIDERS_ENV)?;
		let mut providers = Vec::new();
		let mut chain = BTreeMap::new();

		for id in ids.split(',').map(str::trim).filter(|id| !id.is_empty()) {
			let id = ProviderId::new(id).map_err(ConfigError::from)?;
			let settings = ProviderSettings::from_lookup(id, &lookup)?;

			if let Some(next) = settings.next.clone() {
				chain.insert(settings.id.clone(), next);
			}

			providers.push(settings.into_descriptor()?);
		}

		let config = Self {
			providers,
			request_timeout_secs: optional_number(&lookup, REQUEST_TIMEOUT_ENV)?
				.unwrap_or_else(default_request_timeout_secs),
			session_ttl_secs: optional_number(&lookup, SESSION_TTL_ENV)?
				.unwrap_or_else(default_session_ttl_secs),
			clock_leeway_secs: optional_number(&lookup, CLOCK_LEEWAY_ENV)?.unwrap_or_default(),
			chain,
		};

		config.validate()?;

		Ok(config)
	}

	/// Checks cross-field invariants.
	pub fn validate(&self) -> Result<()> {
		if self.providers.is_empty() {
			return Err(ConfigError::InvalidSetting {
				name: "providers",
				reason: "at least one provider is required".into(),
			}
			.into());
		}
		if self.request_timeout_secs == 0 {
			return Err(ConfigError::InvalidSetting {
				name: "request_timeout_secs",
				reason: "must be positive".into(),
			}
			.into());
		}
		if self.session_ttl_secs == 0 {
			return Err(ConfigError::InvalidSetting {
				name: "session_ttl_secs",
				reason: "must be positive".into(),
			}
			.into());
		}

		let mut seen = HashSet::new();

		for descriptor in &self.providers {
			descriptor.validate().map_err(ConfigError::from)?;

			if !seen.insert(&descriptor.id) {
				return Err(
					ConfigError::DuplicateProvider { provider: descriptor.id.to_string() }.into()
				);
			}
		}
		for provider in self.chain.iter().flat_map(|(from, to)| [from, to]) {
			if !seen.contains(provider) {
				return Err(ConfigError::UnknownProvider { provider: provider.to_string() }.into());
			}
		}

		Ok(())
	}

	/// Descriptor registered under `provider`.
	pub fn descriptor(&self, provider: &ProviderId) -> Option<&ProviderDescriptor> {
		self.providers.iter().find(|descriptor| &descriptor.id == provider)
	}

	/// Per-request timeout.
	pub fn request_timeout(&self) -> StdDuration {
		StdDuration::from_secs(self.request_timeout_secs.into())
	}

	/// Pending-login lifetime.
	pub fn session_ttl(&self) -> Duration {
		Duration::seconds(self.session_ttl_secs.into())
	}

	/// Verification clock leeway.
	pub fn clock_leeway(&self) -> Duration {
		Duration::seconds(self.clock_leeway_secs.into())
	}

	/// Builds one broker per provider over a shared transport and session store, then wires
	/// the configured continuations.
	pub fn build_chain_with<C, M>(
		&self,
		sessions: Arc<dyn SessionStore>,
		http_client: Arc<C>,
		mapper: Arc<M>,
	) -> Result<LoginChain<C, M>>
	where
		C: ?Sized + ProviderHttpClient,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		let strategy: Arc<dyn ProviderStrategy> = Arc::new(DefaultProviderStrategy);
		let mut chain = LoginChain::new();

		for descriptor in &self.providers {
			let broker = <Broker<C, M>>::with_http_client(
				sessions.clone(),
				descriptor.clone(),
				strategy.clone(),
				http_client.clone(),
				mapper.clone(),
			)
			.with_clock_leeway(self.clock_leeway())
			.with_session_ttl(self.session_ttl());

			chain = chain.register(broker);
		}
		for (from, to) in &self.chain {
			chain = chain.then(from, to)?;
		}

		Ok(chain)
	}

	/// Builds the chain over a reqwest transport bounded by [`Self::request_timeout`].
	#[cfg(feature = "reqwest")]
	pub fn build_chain(
		&self,
		sessions: Arc<dyn SessionStore>,
	) -> Result<LoginChain<ReqwestHttpClient, ReqwestTransportErrorMapper>> {
		let http_client = ReqwestHttpClient::with_timeout(self.request_timeout())?;

		self.build_chain_with(sessions, Arc::new(http_client), Arc::new(ReqwestTransportErrorMapper))
	}
}

/// Flat per-provider settings, as read from the environment.
#[derive(Clone, Debug)]
pub struct ProviderSettings {
	/// Provider identifier.
	pub id: ProviderId,
	/// OAuth client identifier.
	pub client_id: String,
	/// Client secret; absent for public PKCE clients.
	pub client_secret: Option<String>,
	/// Callback URL registered with the provider.
	pub redirect_url: Url,
	/// Authorization endpoint.
	pub auth_url: Url,
	/// Token endpoint.
	pub token_url: Url,
	/// JWKS endpoint.
	pub jwks_url: Url,
	/// Requested scopes.
	pub scopes: ScopeSet,
	/// Optional audience.
	pub audience: Option<String>,
	/// Optional logout endpoint.
	pub logout_url: Option<Url>,
	/// Whether authorization requests carry a PKCE challenge.
	pub pkce: bool,
	/// Whether the access token is verified as a JWT.
	pub verify_access_token: bool,
	/// Provider to chain to after a successful login.
	pub next: Option<ProviderId>,
}
impl ProviderSettings {
	/// Reads the settings for `id` from the process environment.
	pub fn from_env(id: ProviderId) -> Result<Self> {
		Self::from_lookup(id, |name| std::env::var(name).ok())
	}

	/// Reads the settings for `id` through `lookup`.
	pub fn from_lookup<F>(id: ProviderId, lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let prefix = id.env_prefix();
		let var = |suffix: &str| format!("{prefix}_{suffix}");
		let scopes = match optional(&lookup, &var("SCOPES")) {
			Some(scopes) => ScopeSet::from_str(&scopes).map_err(ConfigError::from)?,
			None => ScopeSet::new(DEFAULT_SCOPES).map_err(ConfigError::from)?,
		};
		let next = optional(&lookup, &var("NEXT"))
			.map(|next| ProviderId::new(next.trim()))
			.transpose()
			.map_err(ConfigError::from)?;

		Ok(Self {
			client_id: required(&lookup, &var("CLIENT_ID"))?,
			client_secret: optional(&lookup, &var("CLIENT_SECRET")),
			redirect_url: required_url(&lookup, &var("REDIRECT_URL"))?,
			auth_url: required_url(&lookup, &var("AUTH_URL"))?,
			token_url: required_url(&lookup, &var("TOKEN_URL"))?,
			jwks_url: required_url(&lookup, &var("JWKS_URL"))?,
			scopes,
			audience: optional(&lookup, &var("AUDIENCE")),
			logout_url: optional(&lookup, &var("LOGOUT_URL"))
				.map(|value| parse_url(&var("LOGOUT_URL"), &value))
				.transpose()?,
			pkce: optional_flag(&lookup, &var("PKCE"))?.unwrap_or_default(),
			verify_access_token: optional_flag(&lookup, &var("VERIFY_ACCESS_TOKEN"))?
				.unwrap_or_default(),
			next,
			id,
		})
	}

	/// Converts the settings into a validated descriptor.
	///
	/// A provider without a secret is treated as a public client authenticating with PKCE.
	pub fn into_descriptor(self) -> Result<ProviderDescriptor> {
		let client_auth_method = if self.client_secret.is_some() {
			ClientAuthMethod::ClientSecretPost
		} else {
			ClientAuthMethod::NoneWithPkce
		};
		let quirks = ProviderQuirks {
			pkce_required: self.pkce,
			verify_access_token: self.verify_access_token,
			..Default::default()
		};
		let mut builder = ProviderDescriptor::builder(self.id)
			.client_id(self.client_id)
			.redirect_uri(self.redirect_url)
			.authorization_endpoint(self.auth_url)
			.token_endpoint(self.token_url)
			.jwks_endpoint(self.jwks_url)
			.scopes(self.scopes)
			.client_auth_method(client_auth_method)
			.quirks(quirks);

		if let Some(secret) = self.client_secret {
			builder = builder.client_secret(secret);
		}
		if let Some(audience) = self.audience {
			builder = builder.audience(audience);
		}
		if let Some(logout) = self.logout_url {
			builder = builder.logout_endpoint(logout);
		}

		Ok(builder.build().map_err(ConfigError::from)?)
	}
}

fn default_request_timeout_secs() -> u32 {
	10
}

fn default_session_ttl_secs() -> u32 {
	600
}

fn optional<F>(lookup: &F, name: &str) -> Option<String>
where
	F: Fn(&str) -> Option<String>,
{
	lookup(name).filter(|value| !value.trim().is_empty())
}

fn required<F>(lookup: &F, name: &str) -> Result<String>
where
	F: Fn(&str) -> Option<String>,
{
	optional(lookup, name).ok_or_else(|| ConfigError::MissingEnv { name: name.into() }.into())
}

fn required_url<F>(lookup: &F, name: &str) -> Result<Url>
where
	F: Fn(&str) -> Option<String>,
{
	parse_url(name, &required(lookup, name)?)
}

fn parse_url(name: &str, value: &str) -> Result<Url> {
	Url::parse(value.trim())
		.map_err(|e| ConfigError::InvalidEnv { name: name.into(), reason: e.to_string() }.into())
}

fn optional_flag<F>(lookup: &F, name: &str) -> Result<Option<bool>>
where
	F: Fn(&str) -> Option<String>,
{
	let Some(value) = optional(lookup, name) else {
		return Ok(None);
	};

	match value.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(Some(true)),
		"0" | "false" | "no" | "off" => Ok(Some(false)),
		_ => Err(ConfigError::InvalidEnv {
			name: name.into(),
			reason: format!("expected a boolean, found `{value}`"),
		}
		.into()),
	}
}

fn optional_number<F>(lookup: &F, name: &str) -> Result<Option<u32>>
where
	F: Fn(&str) -> Option<String>,
{
	optional(lookup, name)
		.map(|value| {
			value.trim().parse().map_err(|e: std::num::ParseIntError| {
				ConfigError::InvalidEnv { name: name.into(), reason: e.to_string() }.into()
			})
		})
		.transpose()
}
