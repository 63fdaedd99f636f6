//! Per-attempt login state keyed by the CSRF `state` value.
//!
//! A [`PendingLogin`] is created when the broker issues an authorization redirect and is
//! consumed exactly once by the matching callback. Records are never shared between
//! attempts, so concurrent logins for the same provider cannot observe each other's PKCE
//! verifier.

pub mod memory;

pub use memory::MemorySessionStore;

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{_prelude::*, auth::ProviderId, error::SessionError, pkce::PkcePair};

/// Length of generated `state` values.
pub const STATE_LEN: usize = 32;
/// Default lifetime of a pending login.
pub const DEFAULT_SESSION_TTL: Duration = Duration::minutes(10);

/// Boxed future returned by [`SessionStore`] methods.
pub type SessionFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, SessionError>> + 'a + Send>>;

/// Storage contract for pending login attempts.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Records a new attempt. Fails with [`SessionError::Duplicate`] when the key is taken.
	fn insert(&self, login: PendingLogin) -> SessionFuture<'_, ()>;

	/// Removes and returns the attempt for `(provider, state)`.
	///
	/// The record is removed even when it has expired, in which case `None` is returned.
	fn take<'a>(
		&'a self,
		provider: &'a ProviderId,
		state: &'a str,
		now: OffsetDateTime,
	) -> SessionFuture<'a, Option<PendingLogin>>;

	/// Drops every attempt that expired before `now`, returning how many were removed.
	fn purge_expired(&self, now: OffsetDateTime) -> SessionFuture<'_, usize>;
}

/// Unique key of a pending login.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey {
	/// Provider the attempt was started for.
	pub provider: ProviderId,
	/// CSRF `state` value sent to the provider.
	pub state: String,
}

/// Flow state of one in-flight login attempt.
#[derive(Clone)]
pub struct PendingLogin {
	/// Provider the attempt was started for.
	pub provider: ProviderId,
	/// CSRF `state` value sent to the provider.
	pub state: String,
	/// PKCE pair when the provider requires a challenge.
	pub pkce: Option<PkcePair>,
	/// Redirect URI used in the authorization request.
	pub redirect_uri: Url,
	/// Creation instant.
	pub created_at: OffsetDateTime,
	/// Expiry instant.
	pub expires_at: OffsetDateTime,
}
impl PendingLogin {
	/// Starts a new attempt with a fresh `state` value.
	pub fn new(
		provider: ProviderId,
		pkce: Option<PkcePair>,
		redirect_uri: Url,
		now: OffsetDateTime,
		ttl: Duration,
	) -> Self {
		Self {
			provider,
			state: generate_state(),
			pkce,
			redirect_uri,
			created_at: now,
			expires_at: now + ttl,
		}
	}

	/// Store key of this attempt.
	pub fn key(&self) -> SessionKey {
		SessionKey { provider: self.provider.clone(), state: self.state.clone() }
	}

	/// Returns true once the attempt can no longer be completed.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at
	}

	/// Confirms `returned` is the state issued for this attempt.
	pub fn validate_state(&self, returned: &str) -> Result<()> {
		validate_state(&self.state, returned)
	}
}
impl Debug for PendingLogin {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PendingLogin")
			.field("provider", &self.provider)
			.field("state", &self.state)
			.field("pkce", &self.pkce)
			.field("redirect_uri", &self.redirect_uri)
			.field("created_at", &self.created_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Generates an unguessable alphanumeric `state` value.
pub fn generate_state() -> String {
	rand::rng().sample_iter(Alphanumeric).take(STATE_LEN).map(char::from).collect()
}

/// Compares a callback `state` with the issued one without short-circuiting on content.
///
/// An empty issued state never matches.
pub fn validate_state(expected: &str, returned: &str) -> Result<()> {
	let diff = expected.bytes().zip(returned.bytes()).fold(0_u8, |acc, (a, b)| acc | (a ^ b));

	if !expected.is_empty() && expected.len() == returned.len() && diff == 0 {
		Ok(())
	} else {
		#[cfg(feature = "tracing")]
		tracing::warn!("callback state does not match the issued state");

		Err(Error::CsrfMismatch)
	}
}
