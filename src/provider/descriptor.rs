//! Provider descriptor data structures shared by all flows.
//!
//! A descriptor is the immutable per-provider configuration: who the client is, where the
//! provider's endpoints live, and which quirks apply.

/// Builder API for assembling provider descriptors.
pub mod builder;
/// Provider-specific quirk toggles.
pub mod quirks;

pub use builder::*;
pub use quirks::*;

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, ScopeSet, TokenSecret},
};

/// Client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// Form POST body parameters for `client_id`/`client_secret`.
	#[default]
	ClientSecretPost,
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Public clients that prove possession via PKCE only.
	NoneWithPkce,
}

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization (consent page) endpoint.
	pub authorization: Url,
	/// Token endpoint used for code exchanges.
	pub token: Url,
	/// JSON Web Key Set endpoint used to verify issued tokens.
	pub jwks: Url,
	/// Optional logout endpoint accepting the refresh token.
	pub logout: Option<Url>,
}

/// OAuth client registration at a provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRegistration {
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Client secret for confidential clients.
	#[serde(default, skip_serializing)]
	pub client_secret: Option<TokenSecret>,
	/// Redirect URI registered with the provider.
	pub redirect_uri: Url,
}
impl Debug for ClientRegistration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientRegistration")
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("redirect_uri", &self.redirect_uri)
			.finish()
	}
}

/// Immutable provider descriptor consumed by flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Descriptor identifier.
	pub id: ProviderId,
	/// Client registration used for redirects and exchanges.
	pub client: ClientRegistration,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Scopes requested during authorization.
	#[serde(default)]
	pub scopes: ScopeSet,
	/// Resource-server audience appended to authorization requests.
	pub audience: Option<String>,
	/// Client authentication mechanism.
	#[serde(default)]
	pub client_auth_method: ClientAuthMethod,
	/// Provider-specific quirks.
	#[serde(default)]
	pub quirks: ProviderQuirks,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ProviderId) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id)
	}

	/// Returns true when authorization requests must carry a PKCE challenge.
	pub fn uses_pkce(&self) -> bool {
		self.quirks.pkce_required || self.client_auth_method == ClientAuthMethod::NoneWithPkce
	}
}
