// std
use std::collections::BTreeMap;
// self
use idp_broker::{
	auth::{ProviderId, ScopeSet},
	flows,
	jose::AlgorithmFamily,
	pkce::PkcePair,
	provider::{
		ClientAuthMethod, ProviderDescriptor, ProviderDescriptorBuilder, ProviderDescriptorError,
		ProviderErrorContext, ProviderErrorKind, ProviderQuirks, ProviderStrategy,
	},
	url::Url,
};

fn url(value: &str) -> Url {
	Url::parse(value).expect("Failed to parse mock provider URL.")
}

fn builder(id: &str) -> ProviderDescriptorBuilder {
	let provider_id =
		ProviderId::new(id).expect("Failed to build provider identifier for mock descriptor.");

	ProviderDescriptor::builder(provider_id)
		.client_id("mock-client")
		.client_secret("mock-secret")
		.redirect_uri(url("http://localhost:3000/callback"))
}

#[test]
fn descriptor_requires_every_verification_endpoint() {
	let err = builder("mock")
		.authorization_endpoint(url("https://example.com/auth"))
		.token_endpoint(url("https://example.com/token"))
		.build()
		.expect_err("Descriptor builder should reject a missing JWKS endpoint.");

	assert_eq!(err, ProviderDescriptorError::MissingJwksEndpoint);

	let err = builder("mock-insecure")
		.authorization_endpoint(url("http://example.com/auth"))
		.token_endpoint(url("https://example.com/token"))
		.jwks_endpoint(url("https://example.com/jwks"))
		.build()
		.expect_err("Descriptor builder should reject insecure authorization endpoints.");

	assert!(matches!(
		err,
		ProviderDescriptorError::InsecureEndpoint { endpoint: "authorization", .. }
	));
}

#[test]
fn descriptor_json_never_carries_the_secret() {
	let quirks = ProviderQuirks {
		pkce_required: true,
		signing_family: AlgorithmFamily::Ecdsa,
		..ProviderQuirks::default()
	};
	let descriptor = builder("json")
		.authorization_endpoint(url("https://example.com/auth"))
		.token_endpoint(url("https://example.com/token"))
		.jwks_endpoint(url("https://example.com/jwks"))
		.logout_endpoint(url("https://example.com/logout"))
		.client_auth_method(ClientAuthMethod::ClientSecretBasic)
		.quirks(quirks)
		.build()
		.expect("Descriptor builder should succeed for secure endpoints.");
	let json = serde_json::to_string(&descriptor).expect("Descriptor should serialize.");

	assert!(!json.contains("mock-secret"));
	assert!(json.contains("\"signing_family\":\"ecdsa\""));
	assert!(json.contains("\"client_auth_method\":\"client_secret_basic\""));

	let parsed: ProviderDescriptor = serde_json::from_str(&json).expect("Descriptor should parse.");

	assert_eq!(parsed.client.client_secret, None);
	assert_eq!(parsed.endpoints, descriptor.endpoints);
	assert_eq!(parsed.quirks, descriptor.quirks);
}

#[test]
fn custom_strategy_shapes_requests_and_classification() {
	struct TenantStrategy;
	impl ProviderStrategy for TenantStrategy {
		fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
			match ctx.oauth_error.as_deref() {
				Some("expired_code") => ProviderErrorKind::InvalidGrant,
				_ => ProviderErrorKind::Endpoint,
			}
		}

		fn augment_authorization_request(&self, params: &mut BTreeMap<String, String>) {
			params.insert("prompt".into(), "select_account".into());
			params.insert("client_id".into(), "hijacked".into());
		}
	}

	let descriptor = builder("tenant")
		.authorization_endpoint(url("https://example.com/auth"))
		.token_endpoint(url("https://example.com/token"))
		.jwks_endpoint(url("https://example.com/jwks"))
		.scopes(ScopeSet::new(["openid", "email"]).expect("Scopes should be valid."))
		.build()
		.expect("Descriptor should build.");
	let pair = PkcePair::generate();
	let authorize_url =
		flows::build_authorize_url(&descriptor, &TenantStrategy, "state-1", Some(&pair));
	let pairs = authorize_url.query_pairs().into_owned().collect::<BTreeMap<_, _>>();

	assert_eq!(pairs.get("prompt").map(String::as_str), Some("select_account"));
	assert_eq!(pairs.get("client_id").map(String::as_str), Some("mock-client"));
	assert_eq!(pairs.get("scope").map(String::as_str), Some("openid email"));
	assert_eq!(pairs.get("code_challenge").map(String::as_str), Some(pair.challenge()));

	let ctx = ProviderErrorContext::default().with_http_status(400).with_oauth_error("expired_code");

	assert_eq!(TenantStrategy.classify_token_error(&ctx), ProviderErrorKind::InvalidGrant);
}
