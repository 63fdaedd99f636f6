//! Callback handling: state validation, code exchange, and token verification.

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, TokenSet},
	flows::Broker,
	http::ProviderHttpClient,
	jose::{self, Claims, KeySet, VerifiedToken},
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	pkce::PkcePair,
};

/// Query parameters of an authorization callback.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackParams {
	/// Authorization code.
	#[serde(default)]
	pub code: Option<String>,
	/// Echoed CSRF state.
	#[serde(default)]
	pub state: Option<String>,
	/// Provider error code, when the user or provider aborted the flow.
	#[serde(default)]
	pub error: Option<String>,
	/// Provider error description.
	#[serde(default)]
	pub error_description: Option<String>,
}
impl CallbackParams {
	/// Extracts the parameters from a callback URL.
	pub fn from_url(url: &Url) -> Self {
		let mut params = Self::default();

		for (key, value) in url.query_pairs() {
			let slot = match key.as_ref() {
				"code" => &mut params.code,
				"state" => &mut params.state,
				"error" => &mut params.error,
				"error_description" => &mut params.error_description,
				_ => continue,
			};

			slot.get_or_insert_with(|| value.into_owned());
		}

		params
	}
}

/// Result of a completed login.
#[derive(Clone, Debug)]
pub struct LoginOutcome {
	/// Provider that authenticated the user.
	pub provider: ProviderId,
	/// Tokens returned by the exchange.
	pub tokens: TokenSet,
	/// Verified ID token, when the provider issued one.
	pub id_token: Option<VerifiedToken>,
	/// Verified access token, when the provider is configured to issue JWT access tokens.
	pub access_token: Option<VerifiedToken>,
	/// Claims for presentation: the ID token's when present, else the access token's.
	pub claims: Claims,
}

impl<C, M> Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Completes a login attempt from the callback's `state` and `code`.
	///
	/// The attempt is looked up (and consumed) by `state`; an unknown, expired, or already
	/// used state fails with [`Error::CsrfMismatch`] before any token request is made.
	pub async fn complete_login(&self, state: &str, code: &str) -> Result<LoginOutcome> {
		const KIND: FlowKind = FlowKind::Callback;

		let span = FlowSpan::new(KIND, "complete_login");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let pending = self
					.sessions
					.take(&self.descriptor.id, state, OffsetDateTime::now_utc())
					.await?
					.ok_or_else(|| self.csrf_mismatch())?;

				pending.validate_state(state)?;

				let verifier = pending.pkce.as_ref().map(PkcePair::verifier);
				let tokens = self.exchange(code, verifier, &pending.redirect_uri).await?;

				self.verify_tokens(tokens).await
			})
			.await;

		super::record_result(KIND, &result);

		result
	}

	/// Completes a login from the full callback URL.
	///
	/// Provider-reported errors (for example `access_denied`) surface as
	/// [`Error::InvalidGrant`], but only after the state has been checked, so a forged error
	/// callback cannot cancel someone else's attempt.
	pub async fn complete_login_from_url(&self, callback: &Url) -> Result<LoginOutcome> {
		let params = CallbackParams::from_url(callback);
		let state = params.state.as_deref().ok_or(Error::CsrfMismatch)?;

		if let Some(error) = params.error {
			let pending = self
				.sessions
				.take(&self.descriptor.id, state, OffsetDateTime::now_utc())
				.await?
				.ok_or_else(|| self.csrf_mismatch())?;

			pending.validate_state(state)?;

			let reason = match params.error_description {
				Some(description) => format!("{error}: {description}"),
				None => error,
			};

			return Err(Error::InvalidGrant { reason });
		}

		let code = params
			.code
			.as_deref()
			.ok_or_else(|| Error::InvalidGrant { reason: "callback carried no code".into() })?;

		self.complete_login(state, code).await
	}

	/// Fetches the provider's current key set.
	pub async fn fetch_key_set(&self) -> Result<KeySet> {
		jose::fetch_key_set(self.http_client.as_ref(), &self.descriptor.endpoints.jwks).await
	}

	/// Verifies a token issued by this provider against its JWKS endpoint.
	pub async fn verify_token(&self, token: &str) -> Result<VerifiedToken> {
		const KIND: FlowKind = FlowKind::Verify;

		let span = FlowSpan::new(KIND, "verify_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(self.verifier.verify(
				self.http_client.as_ref(),
				&self.descriptor.endpoints.jwks,
				token,
			))
			.await;

		super::record_result(KIND, &result);

		result
	}

	/// Verifies the ID token (when present) and, if configured, the access token.
	///
	/// Headers are checked before the key set is fetched, and the set is fetched once for
	/// both tokens.
	async fn verify_tokens(&self, tokens: TokenSet) -> Result<LoginOutcome> {
		let access = self
			.descriptor
			.quirks
			.verify_access_token
			.then_some(tokens.access_token.expose())
			.filter(|token| !token.is_empty());
		let id = tokens.id_token.as_ref().map(|token| token.expose());

		if id.is_none() && access.is_none() {
			return Err(Error::MissingToken);
		}

		for token in id.iter().chain(access.iter()) {
			self.verifier.check_header(token)?;
		}

		let key_set = self.fetch_key_set().await?;
		let now = OffsetDateTime::now_utc();
		let id_token =
			id.map(|token| self.verifier.verify_with_key_set(token, &key_set, now)).transpose()?;
		let access_token = access
			.map(|token| self.verifier.verify_with_key_set(token, &key_set, now))
			.transpose()?;
		let claims = id_token
			.as_ref()
			.or(access_token.as_ref())
			.map(|token| token.claims().clone())
			.ok_or(Error::MissingToken)?;

		#[cfg(feature = "tracing")]
		tracing::debug!(
			provider = %self.descriptor.id,
			id_token = id_token.is_some(),
			access_token = access_token.is_some(),
			"login tokens verified"
		);

		Ok(LoginOutcome {
			provider: self.descriptor.id.clone(),
			tokens,
			id_token,
			access_token,
			claims,
		})
	}

	fn csrf_mismatch(&self) -> Error {
		#[cfg(feature = "tracing")]
		tracing::warn!(provider = %self.descriptor.id, "callback state matched no pending login");

		Error::CsrfMismatch
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn callback_params_are_extracted() {
		let url = Url::parse(
			"http://localhost:3000/callback?code=c0de&state=abc123&state=second&extra=1",
		)
		.expect("Callback URL should parse.");
		let params = CallbackParams::from_url(&url);

		assert_eq!(params.code.as_deref(), Some("c0de"));
		assert_eq!(params.state.as_deref(), Some("abc123"));
		assert_eq!(params.error, None);

		let url = Url::parse(
			"http://localhost:3000/callback?error=access_denied&error_description=User+cancelled&state=s",
		)
		.expect("Callback URL should parse.");
		let params = CallbackParams::from_url(&url);

		assert_eq!(params.error.as_deref(), Some("access_denied"));
		assert_eq!(params.error_description.as_deref(), Some("User cancelled"));
		assert_eq!(params.code, None);
	}
}
