//! Token sets produced by authorization code exchanges.

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, token::secret::TokenSecret},
};

/// Tokens issued by one provider for one completed login attempt.
///
/// The set is held only in process memory. Its `provider` field pins every token to the
/// key set of the provider that issued it.
#[derive(Clone)]
pub struct TokenSet {
	/// Provider that issued the tokens.
	pub provider: ProviderId,
	/// Access token (opaque string or JWT).
	pub access_token: TokenSecret,
	/// OIDC ID token, when the provider returned one.
	pub id_token: Option<TokenSecret>,
	/// Refresh token, when the provider returned one.
	pub refresh_token: Option<TokenSecret>,
	/// Token type reported by the provider (normally `bearer`).
	pub token_type: String,
	/// Local instant at which the exchange completed.
	pub issued_at: OffsetDateTime,
	/// Access token expiry, when `expires_in` was supplied.
	pub expires_at: Option<OffsetDateTime>,
}
impl TokenSet {
	/// Returns `true` if the access token expired at the provided instant.
	///
	/// Sets without an expiry are treated as unexpired.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| instant >= expires_at)
	}

	/// Returns `true` if the access token is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}
}
impl Debug for TokenSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenSet")
			.field("provider", &self.provider)
			.field("access_token", &"<redacted>")
			.field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("token_type", &self.token_type)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
