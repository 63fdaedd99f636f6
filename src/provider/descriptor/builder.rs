// self
use crate::{
	_prelude::*,
	auth::{ProviderId, ScopeSet, TokenSecret},
	provider::{
		ClientAuthMethod, ClientRegistration, ProviderDescriptor, ProviderEndpoints,
		ProviderQuirks,
	},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ProviderDescriptorError {
	/// Client identifier is mandatory.
	#[error("Missing client identifier.")]
	MissingClientId,
	/// Redirect URI is mandatory.
	#[error("Missing redirect URI.")]
	MissingRedirectUri,
	/// Authorization endpoint is mandatory.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is mandatory.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// JWKS endpoint is mandatory because every token is verified.
	#[error("Missing JWKS endpoint.")]
	MissingJwksEndpoint,
	/// Confidential auth methods need a secret.
	#[error("Client authentication method {method:?} requires a client secret.")]
	MissingClientSecret {
		/// Configured authentication method.
		method: ClientAuthMethod,
	},
	/// Endpoints must use HTTPS unless they target a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Reject scope delimiters that are control characters.
	#[error("Scope delimiter must be a printable character.")]
	InvalidScopeDelimiter {
		/// Invalid delimiter that was supplied.
		delimiter: char,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	/// Identifier for the descriptor being constructed.
	pub id: ProviderId,
	/// OAuth client identifier.
	pub client_id: Option<String>,
	/// Optional client secret.
	pub client_secret: Option<TokenSecret>,
	/// Redirect URI registered with the provider.
	pub redirect_uri: Option<Url>,
	/// Authorization endpoint.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint.
	pub token_endpoint: Option<Url>,
	/// JWKS endpoint.
	pub jwks_endpoint: Option<Url>,
	/// Optional logout endpoint.
	pub logout_endpoint: Option<Url>,
	/// Requested scopes.
	pub scopes: ScopeSet,
	/// Optional audience parameter.
	pub audience: Option<String>,
	/// Client authentication method for the token endpoint.
	pub client_auth_method: ClientAuthMethod,
	/// Provider-specific quirks.
	pub quirks: ProviderQuirks,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: ProviderId) -> Self {
		Self {
			id,
			client_id: None,
			client_secret: None,
			redirect_uri: None,
			authorization_endpoint: None,
			token_endpoint: None,
			jwks_endpoint: None,
			logout_endpoint: None,
			scopes: ScopeSet::default(),
			audience: None,
			client_auth_method: ClientAuthMethod::default(),
			quirks: ProviderQuirks::default(),
		}
	}

	/// Sets the client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the client secret.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Sets the redirect URI.
	pub fn redirect_uri(mut self, url: Url) -> Self {
		self.redirect_uri = Some(url);

		self
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the JWKS endpoint.
	pub fn jwks_endpoint(mut self, url: Url) -> Self {
		self.jwks_endpoint = Some(url);

		self
	}

	/// Sets the optional logout endpoint.
	pub fn logout_endpoint(mut self, url: Url) -> Self {
		self.logout_endpoint = Some(url);

		self
	}

	/// Sets the requested scopes.
	pub fn scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Sets the audience parameter.
	pub fn audience(mut self, audience: impl Into<String>) -> Self {
		self.audience = Some(audience.into());

		self
	}

	/// Overrides the client authentication method.
	pub fn client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth_method = method;

		self
	}

	/// Overrides the provider quirks.
	pub fn quirks(mut self, quirks: ProviderQuirks) -> Self {
		self.quirks = quirks;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let client_id = self
			.client_id
			.filter(|value| !value.is_empty())
			.ok_or(ProviderDescriptorError::MissingClientId)?;
		let redirect_uri = self.redirect_uri.ok_or(ProviderDescriptorError::MissingRedirectUri)?;
		let authorization = self
			.authorization_endpoint
			.ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let jwks = self.jwks_endpoint.ok_or(ProviderDescriptorError::MissingJwksEndpoint)?;
		let descriptor = ProviderDescriptor {
			id: self.id,
			client: ClientRegistration {
				client_id,
				client_secret: self.client_secret,
				redirect_uri,
			},
			endpoints: ProviderEndpoints { authorization, token, jwks, logout: self.logout_endpoint },
			scopes: self.scopes,
			audience: self.audience.filter(|value| !value.is_empty()),
			client_auth_method: self.client_auth_method,
			quirks: self.quirks,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ProviderDescriptor {
	/// Validates invariants for the descriptor.
	pub fn validate(&self) -> Result<(), ProviderDescriptorError> {
		if self.client.client_id.is_empty() {
			return Err(ProviderDescriptorError::MissingClientId);
		}
		if self.client.client_secret.is_none()
			&& self.client_auth_method != ClientAuthMethod::NoneWithPkce
		{
			return Err(ProviderDescriptorError::MissingClientSecret {
				method: self.client_auth_method,
			});
		}

		validate_endpoint("authorization", &self.endpoints.authorization)?;
		validate_endpoint("token", &self.endpoints.token)?;
		validate_endpoint("jwks", &self.endpoints.jwks)?;

		if let Some(logout) = self.endpoints.logout.as_ref() {
			validate_endpoint("logout", logout)?;
		}

		validate_scope_delimiter(self.quirks.scope_delimiter)?;

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ =>
			Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
		Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
		None => false,
	}
}

fn validate_scope_delimiter(delimiter: char) -> Result<(), ProviderDescriptorError> {
	if delimiter.is_control() {
		Err(ProviderDescriptorError::InvalidScopeDelimiter { delimiter })
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Descriptor test URL should parse.")
	}

	fn base() -> ProviderDescriptorBuilder {
		ProviderDescriptor::builder(
			ProviderId::new("sentinel").expect("Provider fixture should be valid."),
		)
		.client_id("client")
		.client_secret("secret")
		.redirect_uri(url("http://localhost:3000/sentinelcallback"))
		.authorization_endpoint(url("https://idp.example.com/authorize"))
		.token_endpoint(url("https://idp.example.com/token"))
		.jwks_endpoint(url("https://idp.example.com/.well-known/jwks.json"))
	}

	#[test]
	fn loopback_endpoints_may_use_plain_http() {
		let descriptor = base()
			.token_endpoint(url("http://127.0.0.1:8080/token"))
			.build()
			.expect("Loopback token endpoint should be accepted.");

		assert_eq!(descriptor.endpoints.token.port(), Some(8080));

		let err = base()
			.jwks_endpoint(url("http://idp.example.com/jwks"))
			.build()
			.expect_err("Remote plain-HTTP endpoints must be rejected.");

		assert!(matches!(err, ProviderDescriptorError::InsecureEndpoint { endpoint: "jwks", .. }));
	}

	#[test]
	fn public_clients_do_not_need_a_secret() {
		let err = ProviderDescriptor::builder(
			ProviderId::new("public").expect("Provider fixture should be valid."),
		)
		.client_id("client")
		.redirect_uri(url("http://localhost:3000/cb"))
		.authorization_endpoint(url("https://idp.example.com/authorize"))
		.token_endpoint(url("https://idp.example.com/token"))
		.jwks_endpoint(url("https://idp.example.com/jwks"))
		.build()
		.expect_err("Confidential clients require a secret.");

		assert!(matches!(err, ProviderDescriptorError::MissingClientSecret { .. }));

		let mut public = base().client_auth_method(ClientAuthMethod::NoneWithPkce);

		public.client_secret = None;

		let descriptor = public.build().expect("Public PKCE client should build.");

		assert!(descriptor.uses_pkce());
	}

	#[test]
	fn empty_audience_is_dropped() {
		let descriptor = base().audience("").build().expect("Descriptor should build.");

		assert_eq!(descriptor.audience, None);
		assert!(!descriptor.uses_pkce());
	}
}
