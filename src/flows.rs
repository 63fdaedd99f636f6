//! Login orchestrators powered by the OAuth facade and the JOSE verifier.
//!
//! A [`Broker`] drives the redirect → callback → exchange → verify sequence for one
//! provider. [`LoginChain`] sequences several brokers, starting the next provider's login
//! only after the previous one completed.

pub mod callback;
pub mod chain;
pub mod exchange;
pub mod logout;
pub mod redirect;

pub use callback::*;
pub use chain::*;
pub use redirect::*;

// self
use crate::{
	_prelude::*,
	http::ProviderHttpClient,
	jose::TokenVerifier,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome},
	provider::{ProviderDescriptor, ProviderStrategy},
	session::{DEFAULT_SESSION_TTL, SessionStore},
};
#[cfg(feature = "reqwest")]
use crate::{
	http::{DEFAULT_REQUEST_TIMEOUT, ReqwestHttpClient},
	oauth::ReqwestTransportErrorMapper,
};

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport stack.
pub type ReqwestBroker = Broker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Coordinates the authorization code flow against a single provider descriptor.
///
/// The broker owns the HTTP client, session store, provider descriptor, strategy, and
/// verifier so each flow step can focus on its own logic. Every login attempt gets its own
/// [`PendingLogin`](crate::session::PendingLogin); nothing attempt-specific lives on the
/// broker itself, so one broker serves any number of concurrent logins.
#[derive(Clone)]
pub struct Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Store holding in-flight login attempts.
	pub sessions: Arc<dyn SessionStore>,
	/// Provider descriptor that defines endpoints, client registration, and quirks.
	pub descriptor: ProviderDescriptor,
	/// Strategy responsible for provider-specific request adjustments.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// Verifier pinned to the provider's signing family.
	pub verifier: TokenVerifier,
	/// Lifetime of a pending login.
	pub session_ttl: Duration,
}
impl<C, M> Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a broker that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		sessions: Arc<dyn SessionStore>,
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		let verifier = TokenVerifier::new(descriptor.quirks.signing_family);

		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			sessions,
			descriptor,
			strategy,
			verifier,
			session_ttl: DEFAULT_SESSION_TTL,
		}
	}

	/// Tolerates clock skew when validating `exp` and `nbf`.
	pub fn with_clock_leeway(mut self, leeway: Duration) -> Self {
		self.verifier = self.verifier.with_leeway(leeway);

		self
	}

	/// Overrides how long a login attempt stays completable.
	pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
		self.session_ttl = if ttl.is_positive() { ttl } else { DEFAULT_SESSION_TTL };

		self
	}
}
#[cfg(feature = "reqwest")]
impl Broker<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a new broker for the provided descriptor.
	///
	/// The broker provisions its own reqwest-backed transport with the default request
	/// timeout so callers do not need to pass HTTP handles explicitly. Fails when that
	/// transport cannot be built.
	pub fn new(
		sessions: Arc<dyn SessionStore>,
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
	) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(DEFAULT_REQUEST_TIMEOUT)?;

		Ok(Self::with_http_client(
			sessions,
			descriptor,
			strategy,
			http_client,
			Arc::new(ReqwestTransportErrorMapper),
		))
	}
}
impl<C, M> Debug for Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("descriptor", &self.descriptor)
			.field("verifier", &self.verifier)
			.field("session_ttl", &self.session_ttl)
			.finish()
	}
}

/// Records the final outcome of an instrumented flow.
fn record_result<T>(kind: FlowKind, result: &Result<T>) {
	match result {
		Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
		Err(_e) => {
			#[cfg(feature = "tracing")]
			tracing::warn!(flow = kind.as_str(), error = _e.kind().as_str(), "flow failed");

			obs::record_flow_outcome(kind, FlowOutcome::Failure);
		},
	}
}
