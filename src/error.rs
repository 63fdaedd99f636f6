//! Broker-level error types shared across flows, providers, verification, and sessions.
//!
//! Every variant terminates the current login attempt only; none of them are fatal to the
//! process. Display strings never carry client secrets, authorization codes, PKCE verifiers,
//! or raw tokens.

// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Session store failure.
	#[error(transparent)]
	Session(#[from] SessionError),

	/// Callback `state` does not match any live login attempt.
	#[error("Authorization state does not match an issued login attempt.")]
	CsrfMismatch,
	/// Provider rejected the grant (bad code, or PKCE verifier mismatch).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Transport or HTTP failure while talking to the token endpoint.
	#[error(transparent)]
	TokenEndpoint(#[from] TokenEndpointError),
	/// Signing keys could not be fetched or decoded.
	#[error(transparent)]
	KeySetUnavailable(#[from] KeySetError),
	/// No key in the fetched set matches the token's `kid`.
	#[error("No signing key matches key identifier {kid:?}.")]
	KeyNotFound {
		/// Key identifier declared by the token header, if any.
		kid: Option<String>,
	},
	/// Token declared an algorithm outside the provider's allow-listed family.
	#[error("Token signing algorithm `{alg}` is not allowed.")]
	UnsupportedAlgorithm {
		/// Algorithm name found in the token header.
		alg: String,
	},
	/// Cryptographic signature check failed.
	#[error("Token signature is invalid.")]
	InvalidSignature,
	/// Token `exp` claim lies in the past.
	#[error("Token has expired.")]
	TokenExpired,
	/// Token `nbf` claim lies in the future.
	#[error("Token is not valid yet.")]
	TokenNotYetValid,
	/// Token is not a well-formed compact JWT.
	#[error("Token is malformed: {reason}.")]
	MalformedToken {
		/// Parsing failure summary.
		reason: String,
	},
	/// Provider response carried no token that could be verified.
	#[error("Provider returned no verifiable token.")]
	MissingToken,
	/// Typed claim access failed.
	#[error(transparent)]
	Claim(#[from] crate::jose::ClaimError),
	/// Provider refused the logout request.
	#[error("Logout endpoint responded with HTTP {status}.")]
	LogoutRejected {
		/// HTTP status returned by the logout endpoint.
		status: u16,
	},
}
impl Error {
	/// Returns the fieldless discriminant of this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Config(_) => ErrorKind::Config,
			Self::Session(_) => ErrorKind::Session,
			Self::CsrfMismatch => ErrorKind::CsrfMismatch,
			Self::InvalidGrant { .. } => ErrorKind::InvalidGrant,
			Self::TokenEndpoint(_) => ErrorKind::TokenEndpointError,
			Self::KeySetUnavailable(_) => ErrorKind::KeySetUnavailable,
			Self::KeyNotFound { .. } => ErrorKind::KeyNotFound,
			Self::UnsupportedAlgorithm { .. } => ErrorKind::UnsupportedAlgorithm,
			Self::InvalidSignature => ErrorKind::InvalidSignature,
			Self::TokenExpired => ErrorKind::TokenExpired,
			Self::TokenNotYetValid => ErrorKind::TokenNotYetValid,
			Self::MalformedToken { .. } => ErrorKind::MalformedToken,
			Self::MissingToken => ErrorKind::MissingToken,
			Self::Claim(_) => ErrorKind::Claim,
			Self::LogoutRejected { .. } => ErrorKind::LogoutRejected,
		}
	}
}

/// Fieldless classification of [`Error`] values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// See [`Error::Config`].
	Config,
	/// See [`Error::Session`].
	Session,
	/// See [`Error::CsrfMismatch`].
	CsrfMismatch,
	/// See [`Error::InvalidGrant`].
	InvalidGrant,
	/// See [`Error::TokenEndpoint`].
	TokenEndpointError,
	/// See [`Error::KeySetUnavailable`].
	KeySetUnavailable,
	/// See [`Error::KeyNotFound`].
	KeyNotFound,
	/// See [`Error::UnsupportedAlgorithm`].
	UnsupportedAlgorithm,
	/// See [`Error::InvalidSignature`].
	InvalidSignature,
	/// See [`Error::TokenExpired`].
	TokenExpired,
	/// See [`Error::TokenNotYetValid`].
	TokenNotYetValid,
	/// See [`Error::MalformedToken`].
	MalformedToken,
	/// See [`Error::MissingToken`].
	MissingToken,
	/// See [`Error::Claim`].
	Claim,
	/// See [`Error::LogoutRejected`].
	LogoutRejected,
}
impl ErrorKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Config => "config",
			Self::Session => "session",
			Self::CsrfMismatch => "csrf_mismatch",
			Self::InvalidGrant => "invalid_grant",
			Self::TokenEndpointError => "token_endpoint_error",
			Self::KeySetUnavailable => "key_set_unavailable",
			Self::KeyNotFound => "key_not_found",
			Self::UnsupportedAlgorithm => "unsupported_algorithm",
			Self::InvalidSignature => "invalid_signature",
			Self::TokenExpired => "token_expired",
			Self::TokenNotYetValid => "token_not_yet_valid",
			Self::MalformedToken => "malformed_token",
			Self::MissingToken => "missing_token",
			Self::Claim => "claim",
			Self::LogoutRejected => "logout_rejected",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Provider identifier is invalid.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// A required environment variable is absent.
	#[error("Environment variable `{name}` is not set.")]
	MissingEnv {
		/// Variable name.
		name: String,
	},
	/// An environment variable could not be interpreted.
	#[error("Environment variable `{name}` is invalid: {reason}.")]
	InvalidEnv {
		/// Variable name.
		name: String,
		/// Why the value was rejected.
		reason: String,
	},
	/// JSON configuration document could not be parsed.
	#[error("Configuration document is malformed.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A broker setting is out of range.
	#[error("Setting `{name}` is invalid: {reason}.")]
	InvalidSetting {
		/// Setting name.
		name: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
	/// Two providers share an identifier.
	#[error("Provider `{provider}` is configured more than once.")]
	DuplicateProvider {
		/// Provider identifier string.
		provider: String,
	},
	/// A chained provider is not registered.
	#[error("Provider `{provider}` is not registered with the login chain.")]
	UnknownProvider {
		/// Provider identifier string.
		provider: String,
	},
	/// Chaining would send the user around in a loop.
	#[error("Chaining to provider `{provider}` would form a cycle.")]
	ChainCycle {
		/// Provider identifier string.
		provider: String,
	},
	/// Descriptor has no logout endpoint.
	#[error("Descriptor `{descriptor}` does not declare a logout endpoint.")]
	MissingLogoutEndpoint {
		/// Provider identifier string.
		descriptor: String,
	},
	/// Token set is missing a refresh secret.
	#[error("Token set is missing a refresh token.")]
	MissingRefreshToken,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Token endpoint failures other than an explicit grant rejection.
#[derive(Debug, ThisError)]
pub enum TokenEndpointError {
	/// Provider answered with a non-success response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	Response {
		/// Provider- or broker-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with a body that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Request did not complete within the configured timeout.
	#[error("Request to the token endpoint timed out.")]
	Timeout,
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TokenEndpointError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}

/// JWKS retrieval failures.
#[derive(Debug, ThisError)]
pub enum KeySetError {
	/// Transport failure while fetching the key set.
	#[error("Network error occurred while fetching the key set.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// JWKS endpoint answered with a non-success status.
	#[error("Key set endpoint responded with HTTP {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
	},
	/// JWKS document is not valid JSON or lacks `keys`.
	#[error("Key set document is malformed.")]
	Malformed {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Request could not be constructed.
	#[error(transparent)]
	Request(#[from] oauth2::http::Error),
}
impl KeySetError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}

/// Session store failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SessionError {
	/// Backend-level failure for the session store.
	#[error("Session backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// A record with the same state is already pending.
	#[error("A login attempt with this state is already pending.")]
	Duplicate,
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn kinds_follow_variants() {
		assert_eq!(Error::CsrfMismatch.kind(), ErrorKind::CsrfMismatch);
		assert_eq!(
			Error::InvalidGrant { reason: "bad verifier".into() }.kind(),
			ErrorKind::InvalidGrant
		);
		assert_eq!(Error::from(TokenEndpointError::Timeout).kind(), ErrorKind::TokenEndpointError);
		assert_eq!(
			Error::from(KeySetError::Status { status: 503 }).kind(),
			ErrorKind::KeySetUnavailable
		);
		assert_eq!(ErrorKind::TokenExpired.to_string(), "token_expired");
	}

	#[test]
	fn session_error_is_exposed_as_source() {
		let err: Error = SessionError::Backend { message: "poisoned".into() }.into();

		assert!(matches!(err, Error::Session(_)));
		assert!(err.to_string().contains("poisoned"));

		let err: Error = ConfigError::MissingRefreshToken.into();

		assert!(StdError::source(&err).is_none());
	}
}
