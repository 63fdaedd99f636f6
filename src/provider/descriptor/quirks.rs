// self
use crate::{_prelude::*, jose::AlgorithmFamily};

/// Provider-specific quirks that influence how flows behave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderQuirks {
	/// Indicates whether authorization requests carry a PKCE challenge.
	pub pkce_required: bool,
	/// Indicates whether the access token is a JWT that must be verified as well.
	pub verify_access_token: bool,
	/// Signing algorithm family the provider's tokens must use.
	pub signing_family: AlgorithmFamily,
	/// Character used to join scopes when constructing `scope` parameters.
	pub scope_delimiter: char,
}
impl Default for ProviderQuirks {
	fn default() -> Self {
		Self {
			pkce_required: false,
			verify_access_token: false,
			signing_family: AlgorithmFamily::Rsa,
			scope_delimiter: ' ',
		}
	}
}
