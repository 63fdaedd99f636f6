//! Unverified JOSE header parsing.
//!
//! The header is decoded by hand rather than through `jsonwebtoken::decode_header`, because
//! that parser refuses algorithms it does not know (including `none`) with a generic error,
//! and the broker must report those as [`Error::UnsupportedAlgorithm`].

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::_prelude::*;

/// Header fields the verifier relies on. Nothing here is trusted until the signature checks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
	/// Declared signing algorithm.
	pub alg: String,
	/// Key identifier selecting the verification key.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kid: Option<String>,
	/// Media type, typically `JWT` or `at+jwt`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub typ: Option<String>,
}
impl TokenHeader {
	/// Decodes the header segment of a compact JWS.
	pub fn parse(token: &str) -> Result<Self> {
		let mut segments = token.split('.');
		let (Some(header), Some(_), Some(_), None) =
			(segments.next(), segments.next(), segments.next(), segments.next())
		else {
			return Err(malformed("expected three dot-separated segments"));
		};
		let raw = URL_SAFE_NO_PAD
			.decode(header.trim_end_matches('='))
			.map_err(|_| malformed("header is not base64url"))?;

		serde_json::from_slice(&raw).map_err(|_| malformed("header is not a JSON object with `alg`"))
	}
}

fn malformed(reason: &str) -> Error {
	Error::MalformedToken { reason: reason.into() }
}
