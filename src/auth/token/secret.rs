//! Secret wrapper that keeps tokens and client credentials out of logs.

// self
use crate::_prelude::*;

/// Redacted secret wrapper for access/ID/refresh tokens and client secrets.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns true when the secret has the three-segment shape of a compact JWT.
	pub fn looks_like_jwt(&self) -> bool {
		let mut segments = self.0.split('.');

		matches!(
			(segments.next(), segments.next(), segments.next(), segments.next()),
			(Some(h), Some(p), Some(_), None) if !h.is_empty() && !p.is_empty()
		)
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
