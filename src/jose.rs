//! JSON Web Token verification against provider key sets.
//!
//! Verification is the only trust boundary of the broker. The pipeline is
//! `Unparsed → HeaderChecked → KeyResolved → SignatureVerified → ClaimsValidated`, and the
//! algorithm allow-list is enforced before any key set is fetched or searched.

pub mod claims;
pub mod header;
pub mod jwks;
pub mod resolver;
pub mod verifier;

pub use claims::*;
pub use header::*;
pub use jwks::*;
pub use resolver::*;
pub use verifier::*;

// crates.io
use jsonwebtoken::Algorithm;
// self
use crate::_prelude::*;

/// Asymmetric signature families a provider may be pinned to.
///
/// Symmetric (`HS*`) algorithms and `none` belong to no family and are always rejected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmFamily {
	/// RSASSA-PKCS1-v1_5 and RSASSA-PSS (`RS*`, `PS*`).
	#[default]
	Rsa,
	/// ECDSA over P-256/P-384 (`ES256`, `ES384`).
	Ecdsa,
}
impl AlgorithmFamily {
	/// Maps a header `alg` value onto a verification algorithm of this family.
	pub fn algorithm(self, alg: &str) -> Option<Algorithm> {
		match (self, alg) {
			(Self::Rsa, "RS256") => Some(Algorithm::RS256),
			(Self::Rsa, "RS384") => Some(Algorithm::RS384),
			(Self::Rsa, "RS512") => Some(Algorithm::RS512),
			(Self::Rsa, "PS256") => Some(Algorithm::PS256),
			(Self::Rsa, "PS384") => Some(Algorithm::PS384),
			(Self::Rsa, "PS512") => Some(Algorithm::PS512),
			(Self::Ecdsa, "ES256") => Some(Algorithm::ES256),
			(Self::Ecdsa, "ES384") => Some(Algorithm::ES384),
			_ => None,
		}
	}

	/// JWK `kty` value of keys belonging to this family.
	pub const fn key_type(self) -> &'static str {
		match self {
			Self::Rsa => "RSA",
			Self::Ecdsa => "EC",
		}
	}
}
impl Display for AlgorithmFamily {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(match self {
			Self::Rsa => "rsa",
			Self::Ecdsa => "ecdsa",
		})
	}
}
