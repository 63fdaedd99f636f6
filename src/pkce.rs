//! PKCE (RFC 7636) verifier and challenge generation.
//!
//! Verifiers are 32 bytes drawn from the OS-seeded thread RNG and encoded as URL-safe
//! base64 without padding (43 characters). Challenges are the unpadded URL-safe base64
//! encoding of the verifier's SHA-256 digest.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Number of random bytes behind every verifier.
pub const VERIFIER_ENTROPY_BYTES: usize = 32;

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}
impl Display for PkceCodeChallengeMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Verifier/challenge pair bound to a single authorization request.
#[derive(Clone)]
pub struct PkcePair {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	/// Generates a fresh pair.
	pub fn generate() -> Self {
		Self::from_verifier(generate_verifier())
	}

	/// Builds a pair around a caller-supplied verifier.
	pub fn from_verifier(verifier: impl Into<String>) -> Self {
		let verifier = verifier.into();
		let challenge = derive_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}

	/// Secret verifier sent with the token exchange. Never log it.
	pub fn verifier(&self) -> &str {
		&self.verifier
	}

	/// Challenge sent with the authorization request.
	pub fn challenge(&self) -> &str {
		&self.challenge
	}

	/// Challenge method (always `S256`).
	pub fn method(&self) -> PkceCodeChallengeMethod {
		self.method
	}
}
impl Debug for PkcePair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkcePair")
			.field("verifier", &"<redacted>")
			.field("challenge", &self.challenge)
			.field("method", &self.method)
			.finish()
	}
}

/// Returns a high-entropy URL-safe verifier.
pub fn generate_verifier() -> String {
	let mut bytes = [0_u8; VERIFIER_ENTROPY_BYTES];

	rand::rng().fill_bytes(&mut bytes);

	URL_SAFE_NO_PAD.encode(bytes)
}

/// Computes the S256 challenge for `verifier`.
pub fn derive_challenge(verifier: &str) -> String {
	let digest = Sha256::digest(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(digest)
}
