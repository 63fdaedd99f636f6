//! Thread-safe in-memory [`SessionStore`] implementation.

// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	error::SessionError,
	session::{PendingLogin, SessionFuture, SessionKey, SessionStore},
};

type SessionMap = Arc<RwLock<HashMap<SessionKey, PendingLogin>>>;

/// Process-local session store. Attempts vanish when the process exits.
///
/// Every insert first sweeps attempts that expired by the new attempt's creation time, so
/// abandoned logins never outlive one TTL plus the next insert.
#[derive(Clone, Debug, Default)]
pub struct MemorySessionStore(SessionMap);
impl MemorySessionStore {
	/// Number of attempts currently held, including expired ones not yet swept.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true when no attempt is pending.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn insert_now(map: SessionMap, login: PendingLogin) -> Result<(), SessionError> {
		let mut guard = map.write();
		let key = login.key();

		guard.retain(|_, pending| !pending.is_expired_at(login.created_at));

		if guard.contains_key(&key) {
			return Err(SessionError::Duplicate);
		}

		guard.insert(key, login);

		Ok(())
	}

	fn take_now(map: SessionMap, key: SessionKey, now: OffsetDateTime) -> Option<PendingLogin> {
		map.write().remove(&key).filter(|login| !login.is_expired_at(now))
	}

	fn purge_now(map: SessionMap, now: OffsetDateTime) -> usize {
		let mut guard = map.write();
		let before = guard.len();

		guard.retain(|_, login| !login.is_expired_at(now));

		before - guard.len()
	}
}
impl SessionStore for MemorySessionStore {
	fn insert(&self, login: PendingLogin) -> SessionFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::insert_now(map, login) })
	}

	fn take<'a>(
		&'a self,
		provider: &'a ProviderId,
		state: &'a str,
		now: OffsetDateTime,
	) -> SessionFuture<'a, Option<PendingLogin>> {
		let map = self.0.clone();
		let key = SessionKey { provider: provider.to_owned(), state: state.to_owned() };

		Box::pin(async move { Ok(Self::take_now(map, key, now)) })
	}

	fn purge_expired(&self, now: OffsetDateTime) -> SessionFuture<'_, usize> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::purge_now(map, now)) })
	}
}
