//! Shared helpers for the integration suites: signing fixtures, descriptors, brokers, and a
//! hand-written provider transport that enforces PKCE.

#![allow(dead_code)]

// std
use std::{
	collections::HashMap,
	future::{self, Future},
	io,
	pin::Pin,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use httpmock::MockServer;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use serde_json::{Value, json};
use time::OffsetDateTime;
// self
use idp_broker::{
	auth::{ProviderId, ScopeSet},
	flows::Broker,
	http::{ProviderHttpClient, ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
	oauth::{BasicTransportErrorMapper, ReqwestTransportErrorMapper},
	pkce,
	provider::{DefaultProviderStrategy, ProviderDescriptor, ProviderStrategy},
	reqwest::Client as ReqwestClient,
	session::{MemorySessionStore, SessionStore},
	url::Url,
};

pub const PROVIDER_A_PEM: &str = include_str!("../fixtures/provider_a.pem");
pub const PROVIDER_B_PEM: &str = include_str!("../fixtures/provider_b.pem");
pub const JWKS_A: &str = include_str!("../fixtures/jwks_a.json");
pub const JWKS_B: &str = include_str!("../fixtures/jwks_b.json");
pub const KID_A: &str = "key-a";
pub const KID_B: &str = "key-b";

/// Broker type used by the reqwest-backed suites.
pub type ReqwestTestBroker = Broker<ReqwestHttpClient, ReqwestTransportErrorMapper>;
/// Broker type used with [`PkceProvider`].
pub type FakeBroker = Broker<PkceProvider, BasicTransportErrorMapper>;

pub fn now() -> i64 {
	OffsetDateTime::now_utc().unix_timestamp()
}

pub fn url(value: &str) -> Url {
	Url::parse(value).expect("Test URL should parse.")
}

pub fn provider_id(value: &str) -> ProviderId {
	ProviderId::new(value).expect("Provider fixture should be valid.")
}

/// Claims valid for the next hour.
pub fn fresh_claims(subject: &str) -> Value {
	json!({
		"sub": subject,
		"iss": "https://idp.example.com/",
		"aud": "client-a",
		"iat": now(),
		"exp": now() + 3_600,
	})
}

/// Signs `claims` with RS256 using the given PEM key and `kid`.
pub fn sign(pem: &str, kid: &str, claims: &Value) -> String {
	let mut header = Header::new(Algorithm::RS256);

	header.kid = Some(kid.to_owned());

	let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("Fixture key should load.");

	jsonwebtoken::encode(&header, claims, &key).expect("Token should sign.")
}

/// Builds a compact token with an arbitrary header and an empty signature segment.
pub fn forge(header: &Value, claims: &Value) -> String {
	let header = URL_SAFE_NO_PAD.encode(header.to_string());
	let claims = URL_SAFE_NO_PAD.encode(claims.to_string());

	format!("{header}.{claims}.")
}

/// Descriptor whose endpoints all live on `base`.
pub fn descriptor(id: &str, base: &str, pkce_required: bool) -> ProviderDescriptor {
	let mut builder = ProviderDescriptor::builder(provider_id(id))
		.client_id("client-a")
		.client_secret("secret-a")
		.redirect_uri(url("http://localhost:3000/callback"))
		.authorization_endpoint(url(&format!("{base}/authorize")))
		.token_endpoint(url(&format!("{base}/token")))
		.jwks_endpoint(url(&format!("{base}/jwks")))
		.logout_endpoint(url(&format!("{base}/logout")))
		.scopes(ScopeSet::new(["openid", "profile", "email"]).expect("Scopes should be valid."));

	builder.quirks.pkce_required = pkce_required;

	builder.build().expect("Descriptor should build.")
}

pub fn mock_descriptor(id: &str, server: &MockServer, pkce_required: bool) -> ProviderDescriptor {
	descriptor(id, server.base_url().trim_end_matches('/'), pkce_required)
}

/// Builds a reqwest client that accepts the self-signed certificates produced by `httpmock`.
pub fn test_reqwest_http_client() -> ReqwestHttpClient {
	let client = ReqwestClient::builder()
		.danger_accept_invalid_certs(true)
		.redirect(idp_broker::reqwest::redirect::Policy::none())
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

/// Reqwest-backed broker over a fresh in-memory session store.
pub fn build_reqwest_test_broker(
	descriptor: ProviderDescriptor,
) -> (ReqwestTestBroker, Arc<MemorySessionStore>) {
	let store = Arc::new(MemorySessionStore::default());
	let sessions: Arc<dyn SessionStore> = store.clone();
	let strategy: Arc<dyn ProviderStrategy> = Arc::new(DefaultProviderStrategy);
	let broker = Broker::with_http_client(
		sessions,
		descriptor,
		strategy,
		test_reqwest_http_client(),
		Arc::new(ReqwestTransportErrorMapper),
	);

	(broker, store)
}

/// Broker wired to a [`PkceProvider`].
pub fn build_fake_broker(
	provider: &PkceProvider,
	sessions: Arc<dyn SessionStore>,
	pkce_required: bool,
) -> FakeBroker {
	let descriptor = descriptor(&provider.id, "https://idp.test", pkce_required);

	Broker::with_http_client(
		sessions,
		descriptor,
		Arc::new(DefaultProviderStrategy),
		provider.clone(),
		Arc::new(BasicTransportErrorMapper),
	)
}

/// In-process provider that issues codes bound to PKCE challenges.
///
/// `/token` answers `invalid_grant` unless the posted `code_verifier` hashes to the challenge
/// the code was issued for. Codes are single use. `/jwks` serves the provider's fixture set.
#[derive(Clone)]
pub struct PkceProvider {
	pub id: String,
	pem: &'static str,
	kid: &'static str,
	jwks: &'static str,
	challenges: Arc<Mutex<HashMap<String, String>>>,
	token_requests: Arc<AtomicUsize>,
}
impl PkceProvider {
	pub fn provider_a() -> Self {
		Self::new("provider-a", PROVIDER_A_PEM, KID_A, JWKS_A)
	}

	pub fn provider_b() -> Self {
		Self::new("provider-b", PROVIDER_B_PEM, KID_B, JWKS_B)
	}

	fn new(id: &str, pem: &'static str, kid: &'static str, jwks: &'static str) -> Self {
		Self {
			id: id.into(),
			pem,
			kid,
			jwks,
			challenges: Default::default(),
			token_requests: Default::default(),
		}
	}

	/// Issues `code` for the challenge carried by `authorize_url`.
	pub fn authorize(&self, authorize_url: &Url, code: &str) {
		let challenge = authorize_url
			.query_pairs()
			.find(|(key, _)| key == "code_challenge")
			.map(|(_, value)| value.into_owned())
			.unwrap_or_default();

		self.challenges
			.lock()
			.expect("Challenge lock should not be poisoned.")
			.insert(code.into(), challenge);
	}

	pub fn token_requests(&self) -> usize {
		self.token_requests.load(Ordering::SeqCst)
	}

	fn respond(&self, request: &HttpRequest) -> HttpResponse {
		match request.uri().path() {
			"/jwks" => json_response(200, self.jwks.to_owned()),
			"/token" => self.token(request),
			_ => json_response(404, "{}".into()),
		}
	}

	fn token(&self, request: &HttpRequest) -> HttpResponse {
		self.token_requests.fetch_add(1, Ordering::SeqCst);

		let form = url::form_urlencoded::parse(request.body())
			.into_owned()
			.collect::<HashMap<String, String>>();
		let code = form.get("code").cloned().unwrap_or_default();
		let challenge =
			self.challenges.lock().expect("Challenge lock should not be poisoned.").remove(&code);
		let verifier = form.get("code_verifier").map(String::as_str).unwrap_or_default();
		let accepted = match challenge {
			Some(challenge) if challenge.is_empty() => true,
			Some(challenge) => pkce::derive_challenge(verifier) == challenge,
			None => false,
		};

		if !accepted {
			return json_response(
				400,
				json!({ "error": "invalid_grant", "error_description": "PKCE verification failed" })
					.to_string(),
			);
		}

		let id_token = sign(self.pem, self.kid, &fresh_claims(&format!("user-{code}")));

		json_response(
			200,
			json!({
				"access_token": format!("opaque-{code}"),
				"token_type": "Bearer",
				"expires_in": 3_600,
				"refresh_token": format!("refresh-{code}"),
				"id_token": id_token,
			})
			.to_string(),
		)
	}
}

fn json_response(status: u16, body: String) -> HttpResponse {
	oauth2::http::Response::builder()
		.status(status)
		.header(oauth2::http::header::CONTENT_TYPE, "application/json")
		.body(body.into_bytes())
		.expect("Fake response should build.")
}

/// Handle returned by [`PkceProvider::with_metadata`].
pub struct PkceHandle {
	provider: PkceProvider,
	slot: ResponseMetadataSlot,
}
impl<'c> AsyncHttpClient<'c> for PkceHandle {
	type Error = HttpClientError<io::Error>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		self.slot.take();

		let response = self.provider.respond(&request);

		self.slot.store(ResponseMetadata { status: Some(response.status().as_u16()) });

		Box::pin(future::ready(Ok(response)))
	}
}
impl ProviderHttpClient for PkceProvider {
	type Handle = PkceHandle;
	type TransportError = io::Error;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		PkceHandle { provider: self.clone(), slot }
	}
}
