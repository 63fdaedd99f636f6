//! Typed access to verified JWT claims.

// crates.io
use serde_json::{Map, Value};
// self
use crate::_prelude::*;

/// Typed claim access failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ClaimError {
	/// Claim is absent.
	#[error("Claim `{claim}` is missing.")]
	Missing {
		/// Claim name.
		claim: String,
	},
	/// Claim is present with an unexpected JSON type.
	#[error("Claim `{claim}` is not {expected}.")]
	TypeMismatch {
		/// Claim name.
		claim: String,
		/// Expected JSON type description.
		expected: &'static str,
	},
}
impl ClaimError {
	fn missing(claim: &str) -> Self {
		Self::Missing { claim: claim.into() }
	}

	fn mismatch(claim: &str, expected: &'static str) -> Self {
		Self::TypeMismatch { claim: claim.into(), expected }
	}
}

/// Claims payload of a token.
///
/// Only values that went through [`TokenVerifier`](crate::jose::TokenVerifier) should be
/// wrapped in this type; the broker never constructs it from an unverified payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);
impl Claims {
	/// Wraps an already verified claims map.
	pub fn new(map: Map<String, Value>) -> Self {
		Self(map)
	}

	/// Raw claim lookup.
	pub fn get(&self, claim: &str) -> Option<&Value> {
		self.0.get(claim)
	}

	/// Returns `true` when the claim is present.
	pub fn contains(&self, claim: &str) -> bool {
		self.0.contains_key(claim)
	}

	/// Required string claim.
	pub fn str(&self, claim: &str) -> Result<&str, ClaimError> {
		self.opt_str(claim)?.ok_or_else(|| ClaimError::missing(claim))
	}

	/// Optional string claim. A present non-string value is still an error.
	pub fn opt_str(&self, claim: &str) -> Result<Option<&str>, ClaimError> {
		match self.0.get(claim) {
			None | Some(Value::Null) => Ok(None),
			Some(Value::String(value)) => Ok(Some(value)),
			Some(_) => Err(ClaimError::mismatch(claim, "a string")),
		}
	}

	/// Required integer claim. Integral floats such as `1.7e9` are accepted.
	pub fn i64(&self, claim: &str) -> Result<i64, ClaimError> {
		self.opt_i64(claim)?.ok_or_else(|| ClaimError::missing(claim))
	}

	/// Optional integer claim.
	pub fn opt_i64(&self, claim: &str) -> Result<Option<i64>, ClaimError> {
		match self.0.get(claim) {
			None | Some(Value::Null) => Ok(None),
			Some(Value::Number(number)) => number
				.as_i64()
				.or_else(|| number.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
				.map(Some)
				.ok_or_else(|| ClaimError::mismatch(claim, "an integer")),
			Some(_) => Err(ClaimError::mismatch(claim, "an integer")),
		}
	}

	/// Required boolean claim.
	pub fn bool(&self, claim: &str) -> Result<bool, ClaimError> {
		match self.0.get(claim) {
			None | Some(Value::Null) => Err(ClaimError::missing(claim)),
			Some(Value::Bool(value)) => Ok(*value),
			Some(_) => Err(ClaimError::mismatch(claim, "a boolean")),
		}
	}

	/// String-or-array claim (for example `aud`), flattened into a list.
	pub fn strings(&self, claim: &str) -> Result<Vec<&str>, ClaimError> {
		match self.0.get(claim) {
			None | Some(Value::Null) => Ok(Vec::new()),
			Some(Value::String(value)) => Ok(vec![value.as_str()]),
			Some(Value::Array(values)) => values
				.iter()
				.map(|value| {
					value.as_str().ok_or_else(|| ClaimError::mismatch(claim, "a string list"))
				})
				.collect(),
			Some(_) => Err(ClaimError::mismatch(claim, "a string list")),
		}
	}

	/// NumericDate claim converted to a timestamp.
	pub fn timestamp(&self, claim: &str) -> Result<Option<OffsetDateTime>, ClaimError> {
		self.opt_i64(claim)?
			.map(|secs| {
				OffsetDateTime::from_unix_timestamp(secs)
					.map_err(|_| ClaimError::mismatch(claim, "a valid NumericDate"))
			})
			.transpose()
	}

	/// `sub` claim.
	pub fn subject(&self) -> Result<&str, ClaimError> {
		self.str("sub")
	}

	/// `iss` claim, when present.
	pub fn issuer(&self) -> Result<Option<&str>, ClaimError> {
		self.opt_str("iss")
	}

	/// `aud` claim as a list.
	pub fn audiences(&self) -> Result<Vec<&str>, ClaimError> {
		self.strings("aud")
	}

	/// `exp` claim, when present.
	pub fn expires_at(&self) -> Result<Option<OffsetDateTime>, ClaimError> {
		self.timestamp("exp")
	}

	/// `nbf` claim, when present.
	pub fn not_before(&self) -> Result<Option<OffsetDateTime>, ClaimError> {
		self.timestamp("nbf")
	}

	/// Iterates over every claim in document order.
	pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.0.iter()
	}

	/// Number of claims.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when the payload carries no claims.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Borrows the raw map.
	pub fn as_map(&self) -> &Map<String, Value> {
		&self.0
	}

	/// Unwraps the raw map.
	pub fn into_map(self) -> Map<String, Value> {
		self.0
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn claims(value: Value) -> Claims {
		match value {
			Value::Object(map) => Claims::new(map),
			_ => panic!("Claims fixture must be an object."),
		}
	}

	#[test]
	fn typed_accessors_distinguish_missing_from_mismatch() {
		let claims = claims(json!({
			"sub": "alice",
			"email_verified": true,
			"exp": 1_700_000_000,
			"iat": 1.7e9,
			"groups": ["admin", "ops"],
			"aud": "broker",
		}));

		assert_eq!(claims.subject(), Ok("alice"));
		assert_eq!(claims.bool("email_verified"), Ok(true));
		assert_eq!(claims.i64("iat"), Ok(1_700_000_000));
		assert_eq!(claims.strings("groups"), Ok(vec!["admin", "ops"]));
		assert_eq!(claims.audiences(), Ok(vec!["broker"]));
		assert_eq!(claims.issuer(), Ok(None));
		assert_eq!(claims.str("email"), Err(ClaimError::Missing { claim: "email".into() }));
		assert_eq!(
			claims.str("exp"),
			Err(ClaimError::TypeMismatch { claim: "exp".into(), expected: "a string" })
		);
		assert!(claims.bool("sub").is_err());
	}

	#[test]
	fn numeric_dates_become_timestamps() {
		let claims = claims(json!({ "exp": 1_700_000_000, "nbf": "soon" }));

		assert_eq!(
			claims.expires_at().expect("exp should be a NumericDate.").map(|t| t.unix_timestamp()),
			Some(1_700_000_000)
		);
		assert!(claims.not_before().is_err());
		assert_eq!(claims.len(), 2);
	}
}
