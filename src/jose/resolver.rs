//! Key selection by `kid`.

// crates.io
use jsonwebtoken::{Algorithm, DecodingKey};
// self
use crate::{
	_prelude::*,
	jose::{AlgorithmFamily, KeyEntry, KeySet, TokenHeader},
};

/// Finds the key a token claims to be signed with.
///
/// Only the unverified header is read. A token without a `kid`, or whose `kid` is not
/// published in `key_set`, yields [`Error::KeyNotFound`].
pub fn resolve_key<'k>(token: &str, key_set: &'k KeySet) -> Result<&'k KeyEntry> {
	let header = TokenHeader::parse(token)?;

	find_key(&header, key_set)
}

/// Header-driven variant of [`resolve_key`].
pub fn find_key<'k>(header: &TokenHeader, key_set: &'k KeySet) -> Result<&'k KeyEntry> {
	let kid = header.kid.as_deref().ok_or(Error::KeyNotFound { kid: None })?;

	key_set.find(kid).ok_or_else(|| Error::KeyNotFound { kid: Some(kid.to_owned()) })
}

/// Produces verification key material for `alg`, refusing keys that cannot honestly verify it.
///
/// A key is unusable when its `kty` belongs to another family or when it is pinned to a
/// different `alg` than the token declares. Both cases are reported as
/// [`Error::KeyNotFound`] so the caller cannot be steered onto a mismatched key.
pub fn decoding_key_for(
	key: &KeyEntry,
	family: AlgorithmFamily,
	alg: Algorithm,
) -> Result<DecodingKey> {
	let not_found = || Error::KeyNotFound { kid: key.kid.clone() };

	if key.key_type != family.key_type() {
		return Err(not_found());
	}
	if key.alg.as_deref().is_some_and(|pinned| family.algorithm(pinned) != Some(alg)) {
		return Err(not_found());
	}

	key.decoding_key()
}
