//! Provider chaining as an explicit continuation.
//!
//! Completing one provider's login never starts another implicitly. [`LoginChain`] returns
//! a [`NextStep`] instead, and only a successful completion yields a redirect to the next
//! provider. A completed login is never discarded because the next provider could not be
//! started; that failure travels in [`NextStep::Failed`].

// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	error::ConfigError,
	flows::{AuthorizeRequest, Broker, LoginOutcome},
	http::ProviderHttpClient,
	oauth::TransportErrorMapper,
};

/// What the caller should do after a login completed.
#[derive(Clone, Debug)]
pub enum NextStep {
	/// Send the user agent to the next provider.
	Redirect {
		/// Provider that the redirect targets.
		provider: ProviderId,
		/// Authorization URL carrying a fresh state (and challenge, if applicable).
		authorize_url: Url,
	},
	/// The chain is finished.
	Done,
	/// The next provider's login could not be started. The completed outcome stays valid.
	Failed {
		/// Provider whose login failed to start.
		provider: ProviderId,
		/// Why it failed.
		error: Arc<Error>,
	},
}
impl NextStep {
	/// Returns true when the chain has nothing left to do.
	pub fn is_done(&self) -> bool {
		matches!(self, Self::Done)
	}
}

/// Completed login plus the continuation.
#[derive(Clone, Debug)]
pub struct ChainedLogin {
	/// Outcome of the provider that just completed.
	pub outcome: LoginOutcome,
	/// Continuation.
	pub next: NextStep,
}

/// Set of brokers with a `provider → next provider` continuation map.
pub struct LoginChain<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	brokers: HashMap<ProviderId, Arc<Broker<C, M>>>,
	next: HashMap<ProviderId, ProviderId>,
}
impl<C, M> LoginChain<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an empty chain.
	pub fn new() -> Self {
		Self { brokers: HashMap::new(), next: HashMap::new() }
	}

	/// Registers a broker under its descriptor's provider id, replacing any previous one.
	pub fn register(mut self, broker: impl Into<Arc<Broker<C, M>>>) -> Self {
		let broker = broker.into();

		self.brokers.insert(broker.descriptor.id.clone(), broker);

		self
	}

	/// Declares that a successful login at `from` continues with a login at `to`.
	pub fn then(mut self, from: &ProviderId, to: &ProviderId) -> Result<Self> {
		for provider in [from, to] {
			if !self.brokers.contains_key(provider) {
				return Err(ConfigError::UnknownProvider { provider: provider.to_string() }.into());
			}
		}

		let mut cursor = Some(to);

		while let Some(provider) = cursor {
			if provider == from {
				return Err(ConfigError::ChainCycle { provider: to.to_string() }.into());
			}

			cursor = self.next.get(provider);
		}

		self.next.insert(from.clone(), to.clone());

		Ok(self)
	}

	/// Broker registered for `provider`.
	pub fn broker(&self, provider: &ProviderId) -> Result<&Arc<Broker<C, M>>> {
		self.brokers
			.get(provider)
			.ok_or_else(|| ConfigError::UnknownProvider { provider: provider.to_string() }.into())
	}

	/// Provider that follows `provider`, if any.
	pub fn next_provider(&self, provider: &ProviderId) -> Option<&ProviderId> {
		self.next.get(provider)
	}

	/// Starts a login at `provider`.
	pub async fn begin_login(&self, provider: &ProviderId) -> Result<AuthorizeRequest> {
		self.broker(provider)?.begin_login().await
	}

	/// Completes the login at `provider` and, on success only, begins the next one.
	///
	/// Errors only when the current login fails. Once it succeeds the outcome is always
	/// returned, with a failure to start the next provider reported as [`NextStep::Failed`].
	pub async fn complete_login(
		&self,
		provider: &ProviderId,
		state: &str,
		code: &str,
	) -> Result<ChainedLogin> {
		let outcome = self.broker(provider)?.complete_login(state, code).await?;
		let next = match self.next.get(provider) {
			Some(next) => match self.begin_login(next).await {
				Ok(request) => NextStep::Redirect {
					provider: request.provider,
					authorize_url: request.authorize_url,
				},
				Err(e) => {
					#[cfg(feature = "tracing")]
					tracing::warn!(
						provider = %provider,
						next = %next,
						error = e.kind().as_str(),
						"chained login could not start"
					);

					NextStep::Failed { provider: next.clone(), error: Arc::new(e) }
				},
			},
			None => NextStep::Done,
		};

		Ok(ChainedLogin { outcome, next })
	}
}
impl<C, M> Default for LoginChain<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn default() -> Self {
		Self::new()
	}
}
impl<C, M> Debug for LoginChain<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginChain")
			.field("providers", &self.brokers.keys().collect::<Vec<_>>())
			.field("next", &self.next)
			.finish()
	}
}
