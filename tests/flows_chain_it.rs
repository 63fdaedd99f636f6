#![cfg(feature = "reqwest")]

mod common;

// std
use std::sync::Arc;
// crates.io
use time::OffsetDateTime;
// self
use common::*;
use idp_broker::{
	auth::ProviderId,
	config::BrokerConfig,
	error::{ConfigError, Error, SessionError},
	flows::{LoginChain, NextStep},
	oauth::BasicTransportErrorMapper,
	session::{MemorySessionStore, PendingLogin, SessionFuture, SessionStore},
};

type FakeChain = LoginChain<PkceProvider, BasicTransportErrorMapper>;

struct Fixture {
	chain: FakeChain,
	store: Arc<MemorySessionStore>,
	provider_a: PkceProvider,
	provider_b: PkceProvider,
}

fn fixture() -> Fixture {
	let store = Arc::new(MemorySessionStore::default());
	let sessions: Arc<dyn SessionStore> = store.clone();
	let provider_a = PkceProvider::provider_a();
	let provider_b = PkceProvider::provider_b();
	let chain = LoginChain::new()
		.register(build_fake_broker(&provider_a, sessions.clone(), true))
		.register(build_fake_broker(&provider_b, sessions, false))
		.then(&provider_id("provider-a"), &provider_id("provider-b"))
		.expect("Both providers are registered.");

	Fixture { chain, store, provider_a, provider_b }
}

#[tokio::test]
async fn successful_login_continues_with_the_next_provider() {
	let Fixture { chain, store, provider_a, provider_b } = fixture();
	let first = chain.begin_login(&provider_id("provider-a")).await.expect("Login should start.");

	provider_a.authorize(&first.authorize_url, "code-a");

	let step = chain
		.complete_login(&provider_id("provider-a"), &first.state, "code-a")
		.await
		.expect("First provider should complete.");

	assert_eq!(step.outcome.claims.subject().expect("Subject should be present."), "user-code-a");

	let NextStep::Redirect { provider, authorize_url } = step.next else {
		panic!("Provider A must continue with provider B.");
	};

	assert_eq!(provider, provider_id("provider-b"));
	assert_eq!(store.len(), 1, "Only the continuation should be pending.");

	let state = authorize_url
		.query_pairs()
		.find(|(key, _)| key == "state")
		.map(|(_, value)| value.into_owned())
		.expect("Continuation URL should carry a state.");

	provider_b.authorize(&authorize_url, "code-b");

	let step = chain
		.complete_login(&provider, &state, "code-b")
		.await
		.expect("Second provider should complete.");

	assert_eq!(step.outcome.provider, provider_id("provider-b"));
	assert!(step.next.is_done());
	assert!(store.is_empty());
}

#[tokio::test]
async fn failed_login_does_not_start_the_next_provider() {
	let Fixture { chain, store, provider_a, provider_b } = fixture();
	let first = chain.begin_login(&provider_id("provider-a")).await.expect("Login should start.");

	provider_a.authorize(&first.authorize_url, "code-a");

	let err = chain
		.complete_login(&provider_id("provider-a"), "abc123", "code-a")
		.await
		.expect_err("A forged state must fail.");

	assert!(matches!(err, Error::CsrfMismatch));
	assert_eq!(store.len(), 1, "Only the original attempt should remain.");

	let err = chain
		.complete_login(&provider_id("provider-a"), &first.state, "never-issued")
		.await
		.expect_err("An unknown code must fail.");

	assert!(matches!(err, Error::InvalidGrant { .. }));
	assert!(store.is_empty(), "No continuation may be started after a failure.");
	assert_eq!(provider_b.token_requests(), 0);
}

/// Store whose backend is unavailable for one provider.
struct PartialOutage {
	inner: MemorySessionStore,
	down: ProviderId,
}
impl SessionStore for PartialOutage {
	fn insert(&self, login: PendingLogin) -> SessionFuture<'_, ()> {
		if login.provider == self.down {
			return Box::pin(async {
				Err::<(), _>(SessionError::Backend { message: "replica unavailable".into() })
			});
		}

		self.inner.insert(login)
	}

	fn take<'a>(
		&'a self,
		provider: &'a ProviderId,
		state: &'a str,
		now: OffsetDateTime,
	) -> SessionFuture<'a, Option<PendingLogin>> {
		self.inner.take(provider, state, now)
	}

	fn purge_expired(&self, now: OffsetDateTime) -> SessionFuture<'_, usize> {
		self.inner.purge_expired(now)
	}
}

#[tokio::test]
async fn completed_login_survives_a_continuation_that_cannot_start() {
	let sessions: Arc<dyn SessionStore> = Arc::new(PartialOutage {
		inner: MemorySessionStore::default(),
		down: provider_id("provider-b"),
	});
	let provider_a = PkceProvider::provider_a();
	let provider_b = PkceProvider::provider_b();
	let chain = LoginChain::new()
		.register(build_fake_broker(&provider_a, sessions.clone(), true))
		.register(build_fake_broker(&provider_b, sessions, false))
		.then(&provider_id("provider-a"), &provider_id("provider-b"))
		.expect("Both providers are registered.");
	let first = chain.begin_login(&provider_id("provider-a")).await.expect("Login should start.");

	provider_a.authorize(&first.authorize_url, "code-a");

	let step = chain
		.complete_login(&provider_id("provider-a"), &first.state, "code-a")
		.await
		.expect("The verified login must be returned.");

	assert_eq!(step.outcome.claims.subject().expect("Subject should be present."), "user-code-a");

	let NextStep::Failed { provider, error } = step.next else {
		panic!("The continuation should report its failure.");
	};

	assert_eq!(provider, provider_id("provider-b"));
	assert!(matches!(*error, Error::Session(SessionError::Backend { .. })));
}

#[tokio::test]
async fn unknown_providers_and_cycles_are_rejected() {
	let Fixture { chain, .. } = fixture();
	let err = chain
		.begin_login(&provider_id("provider-c"))
		.await
		.expect_err("Unregistered providers must be rejected.");

	assert!(matches!(
		err,
		Error::Config(ConfigError::UnknownProvider { ref provider }) if provider == "provider-c"
	));

	let err = chain
		.then(&provider_id("provider-b"), &provider_id("provider-a"))
		.expect_err("Chaining back to the start must be rejected.");

	assert!(matches!(err, Error::Config(ConfigError::ChainCycle { .. })));
}

#[tokio::test]
async fn configuration_builds_a_working_chain() {
	let config = BrokerConfig::from_json(
		r#"{
			"providers": [
				{
					"id": "provider-a",
					"client": {
						"client_id": "client-a",
						"client_secret": "secret-a",
						"redirect_uri": "http://localhost:3000/callback"
					},
					"endpoints": {
						"authorization": "https://idp.test/authorize",
						"token": "https://idp.test/token",
						"jwks": "https://idp.test/jwks"
					},
					"quirks": { "pkce_required": true }
				},
				{
					"id": "provider-b",
					"client": {
						"client_id": "client-b",
						"client_secret": "secret-b",
						"redirect_uri": "http://localhost:3000/callback"
					},
					"endpoints": {
						"authorization": "https://idp.test/authorize",
						"token": "https://idp.test/token",
						"jwks": "https://idp.test/jwks"
					}
				}
			],
			"session_ttl_secs": 60,
			"chain": { "provider-a": "provider-b" }
		}"#,
	)
	.expect("Configuration should load.");
	let provider = PkceProvider::provider_a();
	let chain = config
		.build_chain_with(
			Arc::new(MemorySessionStore::default()),
			Arc::new(provider.clone()),
			Arc::new(BasicTransportErrorMapper),
		)
		.expect("Chain should build.");

	assert_eq!(chain.next_provider(&provider_id("provider-a")), Some(&provider_id("provider-b")));

	let request = chain.begin_login(&provider_id("provider-a")).await.expect("Login should start.");

	provider.authorize(&request.authorize_url, "code-a");

	let step = chain
		.complete_login(&provider_id("provider-a"), &request.state, "code-a")
		.await
		.expect("Login should complete.");

	assert!(matches!(step.next, NextStep::Redirect { .. }));
	assert!(request.expires_at - time::OffsetDateTime::now_utc() <= time::Duration::seconds(60));
}
