//! JWKS retrieval and decoding.
//!
//! Key sets are fetched fresh for every verification. Individual keys that fail to decode
//! (unknown `kty`, encryption-only keys with exotic `alg` values) are skipped instead of
//! poisoning the whole document, so one odd key never blocks logins signed by the others.

// crates.io
use jsonwebtoken::{DecodingKey, jwk::Jwk};
use oauth2::AsyncHttpClient;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	error::KeySetError,
	http::{self, ProviderHttpClient, ResponseMetadataSlot},
};

/// One public key published by a provider.
#[derive(Clone, Debug)]
pub struct KeyEntry {
	/// `kid` of the key, if published.
	pub kid: Option<String>,
	/// `alg` the key is restricted to, if published.
	pub alg: Option<String>,
	/// `kty` of the key (`RSA`, `EC`, ...).
	pub key_type: String,
	jwk: Jwk,
}
impl KeyEntry {
	/// Parsed JWK.
	pub fn jwk(&self) -> &Jwk {
		&self.jwk
	}

	/// Builds verification key material.
	pub fn decoding_key(&self) -> Result<DecodingKey> {
		DecodingKey::from_jwk(&self.jwk).map_err(|_| Error::KeyNotFound { kid: self.kid.clone() })
	}

	fn from_value(value: Value) -> Option<Self> {
		let kid = value.get("kid").and_then(Value::as_str).map(ToOwned::to_owned);
		let alg = value.get("alg").and_then(Value::as_str).map(ToOwned::to_owned);
		let key_type = value.get("kty").and_then(Value::as_str)?.to_owned();

		match serde_json::from_value::<Jwk>(value) {
			Ok(jwk) => Some(Self { kid, alg, key_type, jwk }),
			Err(_e) => {
				#[cfg(feature = "tracing")]
				tracing::debug!(kid = ?kid, kty = %key_type, error = %_e, "skipping undecodable JWK");

				None
			},
		}
	}
}

/// Decoded JSON Web Key Set.
#[derive(Clone, Debug, Default)]
pub struct KeySet {
	keys: Vec<KeyEntry>,
}
impl KeySet {
	/// Decodes a JWKS document.
	///
	/// The document must be a JSON object with a `keys` array; a missing array is an error
	/// while an empty one yields an empty set.
	pub fn from_slice(body: &[u8]) -> Result<Self, KeySetError> {
		#[derive(Deserialize)]
		struct RawKeySet {
			keys: Vec<Value>,
		}

		let mut deserializer = serde_json::Deserializer::from_slice(body);
		let raw: RawKeySet = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| KeySetError::Malformed { source })?;

		Ok(Self { keys: raw.keys.into_iter().filter_map(KeyEntry::from_value).collect() })
	}

	/// Looks up a key by identifier.
	pub fn find(&self, kid: &str) -> Option<&KeyEntry> {
		self.keys.iter().find(|key| key.kid.as_deref() == Some(kid))
	}

	/// Iterates over the decoded keys.
	pub fn iter(&self) -> impl Iterator<Item = &KeyEntry> {
		self.keys.iter()
	}

	/// Number of decodable keys.
	pub fn len(&self) -> usize {
		self.keys.len()
	}

	/// Returns `true` when no key could be decoded.
	pub fn is_empty(&self) -> bool {
		self.keys.is_empty()
	}
}

/// Downloads and decodes the key set published at `url`.
///
/// Transport failures, non-2xx responses, and undecodable documents all surface as
/// [`Error::KeySetUnavailable`].
pub async fn fetch_key_set<C>(http_client: &C, url: &Url) -> Result<KeySet>
where
	C: ?Sized + ProviderHttpClient,
{
	let handle = http_client.with_metadata(ResponseMetadataSlot::default());
	let request = http::get_json_request(url).map_err(KeySetError::from)?;
	let response = handle.call(request).await.map_err(KeySetError::network)?;
	let status = response.status();

	if !status.is_success() {
		return Err(KeySetError::Status { status: status.as_u16() }.into());
	}

	let key_set = KeySet::from_slice(response.body())?;

	#[cfg(feature = "tracing")]
	tracing::debug!(jwks_url = %url, keys = key_set.len(), "fetched key set");

	Ok(key_set)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const JWKS_A: &str = include_str!("../../tests/fixtures/jwks_a.json");

	#[test]
	fn decodes_fixture_and_finds_by_kid() {
		let key_set = KeySet::from_slice(JWKS_A.as_bytes()).expect("Fixture JWKS should decode.");
		let key = key_set.find("key-a").expect("Fixture key should be present.");

		assert_eq!(key.key_type, "RSA");
		assert_eq!(key.alg.as_deref(), Some("RS256"));
		assert!(key.decoding_key().is_ok());
		assert!(key_set.find("key-b").is_none());
	}

	#[test]
	fn undecodable_keys_are_skipped() {
		let mut doc: Value = serde_json::from_str(JWKS_A).expect("Fixture JWKS should be JSON.");
		let keys = doc["keys"].as_array_mut().expect("Fixture should carry a key array.");

		keys.insert(0, serde_json::json!({ "kty": "weird", "kid": "x" }));
		keys.insert(1, serde_json::json!({ "kid": "no-kty" }));

		let body = serde_json::to_vec(&doc).expect("Mixed JWKS should serialize.");
		let key_set = KeySet::from_slice(&body).expect("Mixed JWKS should decode.");

		assert_eq!(key_set.len(), 1);
		assert!(key_set.find("x").is_none());
		assert!(key_set.find("key-a").is_some());
	}

	#[test]
	fn documents_without_keys_are_malformed() {
		assert!(matches!(
			KeySet::from_slice(br#"{"issuer":"x"}"#),
			Err(KeySetError::Malformed { .. })
		));
		assert!(matches!(KeySet::from_slice(b"<html>"), Err(KeySetError::Malformed { .. })));
		assert!(KeySet::from_slice(br#"{"keys":[]}"#).expect("Empty set should decode.").is_empty());
	}
}
