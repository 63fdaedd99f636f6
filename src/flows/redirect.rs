//! Authorization redirect construction.

// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	flows::Broker,
	http::ProviderHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	pkce::PkcePair,
	provider::{ProviderDescriptor, ProviderStrategy},
	session::PendingLogin,
};

/// Redirect issued by [`Broker::begin_login`].
#[derive(Clone)]
pub struct AuthorizeRequest {
	/// Provider the redirect targets.
	pub provider: ProviderId,
	/// Fully-formed authorization URL to send the user agent to.
	pub authorize_url: Url,
	/// CSRF `state` embedded in the URL.
	pub state: String,
	/// Instant after which the callback is refused.
	pub expires_at: OffsetDateTime,
}
impl Debug for AuthorizeRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizeRequest")
			.field("provider", &self.provider)
			.field("authorize_url", &self.authorize_url.as_str())
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

impl<C, M> Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Starts a login attempt and returns the redirect for the user agent.
	///
	/// A fresh `state` (and PKCE pair, when the provider uses PKCE) is generated and stored
	/// as a [`PendingLogin`] that only the matching callback can consume.
	pub async fn begin_login(&self) -> Result<AuthorizeRequest> {
		const KIND: FlowKind = FlowKind::Login;

		let span = FlowSpan::new(KIND, "begin_login");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let pkce = self.descriptor.uses_pkce().then(PkcePair::generate);
				let pending = PendingLogin::new(
					self.descriptor.id.clone(),
					pkce,
					self.descriptor.client.redirect_uri.clone(),
					OffsetDateTime::now_utc(),
					self.session_ttl,
				);
				let authorize_url = build_authorize_url(
					&self.descriptor,
					self.strategy.as_ref(),
					&pending.state,
					pending.pkce.as_ref(),
				);
				let request = AuthorizeRequest {
					provider: pending.provider.clone(),
					authorize_url,
					state: pending.state.clone(),
					expires_at: pending.expires_at,
				};

				self.sessions.insert(pending).await?;

				Ok(request)
			})
			.await;

		super::record_result(KIND, &result);

		result
	}
}

/// Builds the provider authorization URL.
///
/// Adds `response_type=code`, `client_id`, `redirect_uri`, `scope` (joined with the
/// provider's delimiter), `state`, the S256 challenge when `pkce` is given, and `audience`
/// when configured. Strategy parameters come last and never override the ones above.
pub fn build_authorize_url(
	descriptor: &ProviderDescriptor,
	strategy: &dyn ProviderStrategy,
	state: &str,
	pkce: Option<&PkcePair>,
) -> Url {
	let mut extra = BTreeMap::new();

	strategy.augment_authorization_request(&mut extra);

	let mut url = descriptor.endpoints.authorization.clone();
	let reserved = url.query_pairs().map(|(key, _)| key.into_owned()).collect::<Vec<_>>();
	let mut pairs = url.query_pairs_mut();
	let mut written = vec!["response_type", "client_id", "redirect_uri", "state"];

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", &descriptor.client.client_id);
	pairs.append_pair("redirect_uri", descriptor.client.redirect_uri.as_str());

	if let Some(scope) = descriptor.scopes.join(descriptor.quirks.scope_delimiter) {
		pairs.append_pair("scope", &scope);
		written.push("scope");
	}

	pairs.append_pair("state", state);

	if let Some(pkce) = pkce {
		pairs.append_pair("code_challenge", pkce.challenge());
		pairs.append_pair("code_challenge_method", pkce.method().as_str());
		written.extend(["code_challenge", "code_challenge_method"]);
	}
	if let Some(audience) = descriptor.audience.as_deref() {
		pairs.append_pair("audience", audience);
		written.push("audience");
	}

	for (key, value) in extra {
		if written.contains(&key.as_str()) || reserved.contains(&key) {
			continue;
		}

		pairs.append_pair(&key, &value);
	}

	drop(pairs);

	url
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::ScopeSet,
		pkce,
		provider::{DefaultProviderStrategy, ProviderErrorContext, ProviderErrorKind},
	};

	struct PromptStrategy;
	impl ProviderStrategy for PromptStrategy {
		fn classify_token_error(&self, _ctx: &ProviderErrorContext) -> ProviderErrorKind {
			ProviderErrorKind::Endpoint
		}

		fn augment_authorization_request(&self, params: &mut BTreeMap<String, String>) {
			params.insert("prompt".into(), "login".into());
			params.insert("state".into(), "attacker".into());
		}
	}

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Redirect test URL should parse.")
	}

	fn descriptor(pkce_required: bool) -> ProviderDescriptor {
		let mut builder = ProviderDescriptor::builder(
			ProviderId::new("provider-a").expect("Provider fixture should be valid."),
		)
		.client_id("client-a")
		.client_secret("secret-a")
		.redirect_uri(url("http://localhost:3000/callback"))
		.authorization_endpoint(url("https://idp.example.com/authorize?tenant=t1"))
		.token_endpoint(url("https://idp.example.com/token"))
		.jwks_endpoint(url("https://idp.example.com/jwks"))
		.scopes(ScopeSet::new(["openid", "profile"]).expect("Scopes should be valid."))
		.audience("https://api.example.com");

		builder.quirks.pkce_required = pkce_required;

		builder.build().expect("Descriptor should build.")
	}

	fn query(url: &Url) -> BTreeMap<String, String> {
		url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect()
	}

	#[test]
	fn pkce_redirect_carries_challenge_and_state() {
		let descriptor = descriptor(true);
		let pair = PkcePair::from_verifier("V");
		let url = build_authorize_url(&descriptor, &DefaultProviderStrategy, "abc123", Some(&pair));
		let params = query(&url);

		assert_eq!(params.get("response_type").map(String::as_str), Some("code"));
		assert_eq!(params.get("client_id").map(String::as_str), Some("client-a"));
		assert_eq!(
			params.get("redirect_uri").map(String::as_str),
			Some("http://localhost:3000/callback")
		);
		assert_eq!(params.get("scope").map(String::as_str), Some("openid profile"));
		assert_eq!(params.get("state").map(String::as_str), Some("abc123"));
		assert_eq!(params.get("code_challenge"), Some(&pkce::derive_challenge("V")));
		assert_eq!(params.get("code_challenge_method").map(String::as_str), Some("S256"));
		assert_eq!(params.get("audience").map(String::as_str), Some("https://api.example.com"));
		assert_eq!(params.get("tenant").map(String::as_str), Some("t1"));
	}

	#[test]
	fn plain_redirect_has_no_challenge() {
		let descriptor = descriptor(false);
		let url = build_authorize_url(&descriptor, &DefaultProviderStrategy, "s", None);
		let params = query(&url);

		assert!(!params.contains_key("code_challenge"));
		assert!(!params.contains_key("code_challenge_method"));
		assert_eq!(params.get("state").map(String::as_str), Some("s"));
	}

	#[test]
	fn strategy_parameters_cannot_override_core_ones() {
		let descriptor = descriptor(false);
		let url = build_authorize_url(&descriptor, &PromptStrategy, "issued", None);
		let states = url.query_pairs().filter(|(k, _)| k == "state").count();

		assert_eq!(states, 1);
		assert_eq!(query(&url).get("state").map(String::as_str), Some("issued"));
		assert_eq!(query(&url).get("prompt").map(String::as_str), Some("login"));
	}
}
