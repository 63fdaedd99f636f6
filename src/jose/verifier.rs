//! Token verification pipeline.

// crates.io
use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind as JwtErrorKind};
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	http::ProviderHttpClient,
	jose::{self, AlgorithmFamily, Claims, KeySet, TokenHeader},
};

/// Ordered stages a token passes through. A token is trusted only at
/// [`VerificationStage::ClaimsValidated`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VerificationStage {
	/// Nothing checked yet.
	Unparsed,
	/// Header decoded and `alg` accepted by the allow-list.
	HeaderChecked,
	/// Verification key selected by `kid`.
	KeyResolved,
	/// Signature verified against the resolved key.
	SignatureVerified,
	/// Temporal claims validated.
	ClaimsValidated,
}
impl VerificationStage {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Unparsed => "unparsed",
			Self::HeaderChecked => "header_checked",
			Self::KeyResolved => "key_resolved",
			Self::SignatureVerified => "signature_verified",
			Self::ClaimsValidated => "claims_validated",
		}
	}
}
impl Display for VerificationStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Temporal verdict for a signature-verified token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Validity {
	/// Inside its validity window.
	Valid,
	/// `exp` has passed.
	Expired,
	/// `nbf` is still in the future.
	NotYetValid,
}

/// Output of the verification pipeline.
///
/// Tokens returned by [`TokenVerifier::verify`] and [`TokenVerifier::verify_with_key_set`]
/// are always valid. [`TokenVerifier::inspect_with_key_set`] also returns signature-verified
/// tokens that failed the temporal checks, so callers of that method must consult
/// [`VerifiedToken::is_valid`] or go through [`VerifiedToken::into_valid`].
#[derive(Clone, Debug)]
pub struct VerifiedToken {
	header: TokenHeader,
	algorithm: Algorithm,
	claims: Claims,
	validity: Validity,
}
impl VerifiedToken {
	/// Header as declared by the token.
	pub fn header(&self) -> &TokenHeader {
		&self.header
	}

	/// Algorithm the signature was verified with.
	pub fn algorithm(&self) -> Algorithm {
		self.algorithm
	}

	/// Signature-verified claims.
	pub fn claims(&self) -> &Claims {
		&self.claims
	}

	/// Temporal verdict.
	pub fn validity(&self) -> Validity {
		self.validity
	}

	/// `true` only when every check passed.
	pub fn is_valid(&self) -> bool {
		self.validity == Validity::Valid
	}

	/// Last stage the token reached.
	pub fn stage(&self) -> VerificationStage {
		if self.is_valid() {
			VerificationStage::ClaimsValidated
		} else {
			VerificationStage::SignatureVerified
		}
	}

	/// Converts a temporal rejection into the matching error.
	pub fn into_valid(self) -> Result<Self> {
		match self.validity {
			Validity::Valid => Ok(self),
			Validity::Expired => Err(Error::TokenExpired),
			Validity::NotYetValid => Err(Error::TokenNotYetValid),
		}
	}

	/// Unwraps the claims.
	pub fn into_claims(self) -> Claims {
		self.claims
	}
}

/// Verifies provider-issued JWTs against the provider's published keys.
#[derive(Clone, Debug, Default)]
pub struct TokenVerifier {
	family: AlgorithmFamily,
	leeway: Duration,
}
impl TokenVerifier {
	/// Creates a verifier pinned to `family` with zero clock leeway.
	pub fn new(family: AlgorithmFamily) -> Self {
		Self { family, leeway: Duration::ZERO }
	}

	/// Tolerates clock skew of up to `leeway` on `exp` and `nbf`. Negative values count as zero.
	pub fn with_leeway(mut self, leeway: Duration) -> Self {
		self.leeway = leeway.max(Duration::ZERO);

		self
	}

	/// Allow-listed algorithm family.
	pub fn family(&self) -> AlgorithmFamily {
		self.family
	}

	/// Configured clock leeway.
	pub fn leeway(&self) -> Duration {
		self.leeway
	}

	/// Decodes the header and enforces the algorithm allow-list.
	///
	/// Runs before any key material is fetched, so `none` and symmetric algorithms are
	/// rejected without touching the network.
	pub fn check_header(&self, token: &str) -> Result<(TokenHeader, Algorithm)> {
		let header =
			TokenHeader::parse(token).map_err(|e| rejected(VerificationStage::Unparsed, e))?;

		match self.family.algorithm(&header.alg) {
			Some(alg) => Ok((header, alg)),
			None => Err(rejected(
				VerificationStage::Unparsed,
				Error::UnsupportedAlgorithm { alg: header.alg },
			)),
		}
	}

	/// Fetches the key set from `jwks_url` and verifies `token` against it.
	pub async fn verify<C>(
		&self,
		http_client: &C,
		jwks_url: &Url,
		token: &str,
	) -> Result<VerifiedToken>
	where
		C: ?Sized + ProviderHttpClient,
	{
		self.check_header(token)?;

		let key_set = jose::fetch_key_set(http_client, jwks_url)
			.await
			.map_err(|e| rejected(VerificationStage::HeaderChecked, e))?;

		self.verify_with_key_set(token, &key_set, OffsetDateTime::now_utc())
	}

	/// Verifies `token` against an already fetched key set, evaluating time claims at `now`.
	pub fn verify_with_key_set(
		&self,
		token: &str,
		key_set: &KeySet,
		now: OffsetDateTime,
	) -> Result<VerifiedToken> {
		self.inspect_with_key_set(token, key_set, now)?
			.into_valid()
			.map_err(|e| rejected(VerificationStage::SignatureVerified, e))
	}

	/// Like [`TokenVerifier::verify_with_key_set`], but reports temporal failures through
	/// [`VerifiedToken::validity`] instead of an error.
	pub fn inspect_with_key_set(
		&self,
		token: &str,
		key_set: &KeySet,
		now: OffsetDateTime,
	) -> Result<VerifiedToken> {
		let (header, algorithm) = self.check_header(token)?;
		let key = jose::find_key(&header, key_set)
			.and_then(|key| jose::decoding_key_for(key, self.family, algorithm))
			.map_err(|e| rejected(VerificationStage::HeaderChecked, e))?;
		let claims = verify_signature(token, &key, algorithm)
			.map_err(|e| map_jwt_error(e, &header))
			.map_err(|e| rejected(VerificationStage::KeyResolved, e))?;
		let validity = self
			.temporal_validity(&claims, now)
			.map_err(|e| rejected(VerificationStage::SignatureVerified, e))?;

		Ok(VerifiedToken { header, algorithm, claims, validity })
	}

	fn temporal_validity(&self, claims: &Claims, now: OffsetDateTime) -> Result<Validity> {
		let now = now.unix_timestamp();
		let leeway = self.leeway.whole_seconds();

		if claims.opt_i64("exp")?.is_some_and(|exp| now >= exp.saturating_add(leeway)) {
			return Ok(Validity::Expired);
		}
		if claims.opt_i64("nbf")?.is_some_and(|nbf| now.saturating_add(leeway) < nbf) {
			return Ok(Validity::NotYetValid);
		}

		Ok(Validity::Valid)
	}
}

fn verify_signature(
	token: &str,
	key: &DecodingKey,
	algorithm: Algorithm,
) -> Result<Claims, jsonwebtoken::errors::Error> {
	let mut validation = Validation::new(algorithm);

	// Temporal and audience checks run in `temporal_validity`.
	validation.validate_exp = false;
	validation.validate_nbf = false;
	validation.validate_aud = false;
	validation.required_spec_claims.clear();

	jsonwebtoken::decode::<Map<String, Value>>(token, key, &validation)
		.map(|data| Claims::new(data.claims))
}

fn map_jwt_error(e: jsonwebtoken::errors::Error, header: &TokenHeader) -> Error {
	match e.kind() {
		JwtErrorKind::InvalidSignature | JwtErrorKind::Crypto(_) => Error::InvalidSignature,
		JwtErrorKind::InvalidRsaKey(_)
		| JwtErrorKind::InvalidEcdsaKey
		| JwtErrorKind::InvalidKeyFormat => Error::KeyNotFound { kid: header.kid.clone() },
		JwtErrorKind::InvalidAlgorithm
		| JwtErrorKind::InvalidAlgorithmName
		| JwtErrorKind::MissingAlgorithm => Error::UnsupportedAlgorithm { alg: header.alg.clone() },
		JwtErrorKind::ExpiredSignature => Error::TokenExpired,
		JwtErrorKind::ImmatureSignature => Error::TokenNotYetValid,
		_ => Error::MalformedToken { reason: e.to_string() },
	}
}

/// Logs where the pipeline stopped. `reached` is the last stage the token passed.
fn rejected(reached: VerificationStage, e: Error) -> Error {
	#[cfg(feature = "tracing")]
	tracing::debug!(stage = reached.as_str(), error = e.kind().as_str(), "token rejected");
	#[cfg(not(feature = "tracing"))]
	let _ = reached;

	e
}
