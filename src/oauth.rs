//! Internal OAuth client facade for the authorization code exchange.
//!
//! The facade configures an [`oauth2::Client`] from a [`ProviderDescriptor`], performs the
//! `grant_type=authorization_code` request through a [`ProviderHttpClient`], and normalizes
//! every failure into the broker taxonomy with the help of the provider strategy and a
//! [`TransportErrorMapper`].

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, EndpointNotSet,
	EndpointSet, ExtraTokenFields, HttpClientError, PkceCodeVerifier, RedirectUrl,
	RequestTokenError, StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
		BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::{ProviderId, TokenSecret, TokenSet},
	error::{ConfigError, TokenEndpointError},
	http::{ProviderHttpClient, ResponseMetadata, ResponseMetadataSlot},
	provider::{
		ClientAuthMethod, ProviderDescriptor, ProviderErrorContext, ProviderErrorKind,
		ProviderStrategy,
	},
};

/// Token response carrying the OIDC `id_token` alongside the standard fields.
pub type ExchangeTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

type UnconfiguredClient = Client<
	BasicErrorResponse,
	ExchangeTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
>;
type ConfiguredClient = Client<
	BasicErrorResponse,
	ExchangeTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type ExchangeError<E> = RequestTokenError<HttpClientError<E>, BasicErrorResponse>;

/// Extra token endpoint fields understood by the broker.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct IdTokenFields {
	/// OIDC ID token, when the provider issues one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}
impl Debug for IdTokenFields {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdTokenFields").field("id_token_set", &self.id_token.is_some()).finish()
	}
}

/// Maps HTTP transport failures into broker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a broker error.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Transport-agnostic mapper: any transport error becomes a network failure.
///
/// Suitable for custom [`ProviderHttpClient`] implementations that do not distinguish
/// timeouts from other failures.
#[derive(Clone, Debug, Default)]
pub struct BasicTransportErrorMapper;
impl<E> TransportErrorMapper<E> for BasicTransportErrorMapper
where
	E: 'static + Send + Sync + StdError,
{
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<E>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => TokenEndpointError::network(*inner).into(),
			other => map_common_transport_error(meta, other),
		}
	}
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(*inner),
			other => map_common_transport_error(meta, other),
		}
	}
}

pub(crate) struct BasicFacade<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_descriptor(
		descriptor: &ProviderDescriptor,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let mut oauth_client: ConfiguredClient =
			UnconfiguredClient::new(ClientId::new(descriptor.client.client_id.clone()))
				.set_auth_uri(auth_url)
				.set_token_uri(token_url);

		match descriptor.client_auth_method {
			ClientAuthMethod::NoneWithPkce => {},
			ClientAuthMethod::ClientSecretBasic | ClientAuthMethod::ClientSecretPost => {
				if let Some(secret) = descriptor.client.client_secret.as_ref() {
					oauth_client = oauth_client
						.set_client_secret(ClientSecret::new(secret.expose().to_owned()));
				}
			},
		}

		if descriptor.client_auth_method == ClientAuthMethod::ClientSecretPost {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self { oauth_client, http_client, error_mapper })
	}

	/// Exchanges `code` (and the PKCE verifier, when the attempt used one) for tokens.
	pub(crate) async fn exchange_authorization_code(
		&self,
		strategy: &dyn ProviderStrategy,
		provider: &ProviderId,
		code: &str,
		pkce_verifier: Option<&str>,
		redirect_uri: &Url,
	) -> Result<TokenSet> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let redirect_url = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let mut extra = BTreeMap::new();

		strategy.augment_token_request(&mut extra);

		let mut request = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_redirect_uri(Cow::Owned(redirect_url));

		if let Some(verifier) = pkce_verifier {
			request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier.to_owned()));
		}
		for (key, value) in extra {
			request = request.add_extra_param(key, value);
		}

		let response = request.request_async(&instrumented).await.map_err(|err| {
			map_request_error(strategy, meta.take(), err, self.error_mapper.as_ref())
		})?;

		Ok(into_token_set(provider.clone(), &response, OffsetDateTime::now_utc()))
	}
}

fn into_token_set(
	provider: ProviderId,
	response: &ExchangeTokenResponse,
	issued_at: OffsetDateTime,
) -> TokenSet {
	let expires_at = response
		.expires_in()
		.and_then(|expires_in| Duration::try_from(expires_in).ok())
		.filter(|expires_in| expires_in.is_positive())
		.map(|expires_in| issued_at + expires_in);

	TokenSet {
		provider,
		access_token: TokenSecret::new(response.access_token().secret().to_owned()),
		id_token: response.extra_fields().id_token.clone().map(TokenSecret::new),
		refresh_token: response
			.refresh_token()
			.map(|token| TokenSecret::new(token.secret().to_owned())),
		token_type: response.token_type().as_ref().to_owned(),
		issued_at,
		expires_at,
	}
}

fn map_request_error<E, M>(
	strategy: &dyn ProviderStrategy,
	meta: Option<ResponseMetadata>,
	err: ExchangeError<E>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(strategy, response, meta),
		RequestTokenError::Request(error) => mapper.map_transport_error(meta, error),
		RequestTokenError::Parse(source, body) => {
			let status = meta_status(meta);

			// Error statuses with non-JSON bodies still get a chance at grant classification.
			if status.is_some_and(|status| status >= 400) {
				let ctx = error_context(status)
					.with_body_preview(String::from_utf8_lossy(&body).into_owned());

				if strategy.classify_token_error(&ctx) == ProviderErrorKind::InvalidGrant {
					return Error::InvalidGrant {
						reason: ctx.body_preview.unwrap_or_else(|| "unparseable response".into()),
					};
				}
			}

			TokenEndpointError::MalformedResponse { source, status }.into()
		},
		RequestTokenError::Other(message) => {
			let status = meta_status(meta);

			match strategy.classify_token_error(&error_context(status)) {
				ProviderErrorKind::InvalidGrant => Error::InvalidGrant { reason: message },
				ProviderErrorKind::Endpoint =>
					TokenEndpointError::Response { message, status }.into(),
			}
		},
	}
}

fn map_server_response_error(
	strategy: &dyn ProviderStrategy,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let status = meta_status(meta);
	let mut ctx = error_context(status).with_oauth_error(response.error().as_ref().to_owned());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}

	let message = match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	};

	match strategy.classify_token_error(&ctx) {
		ProviderErrorKind::InvalidGrant => Error::InvalidGrant { reason: message },
		ProviderErrorKind::Endpoint => TokenEndpointError::Response { message, status }.into(),
	}
}

fn map_common_transport_error<E>(meta: Option<&ResponseMetadata>, err: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) if inner.kind() == std::io::ErrorKind::TimedOut =>
			TokenEndpointError::Timeout.into(),
		HttpClientError::Io(inner) => TokenEndpointError::Io(inner).into(),
		HttpClientError::Other(message) =>
			TokenEndpointError::Response { message, status: meta_status(meta) }.into(),
		other => TokenEndpointError::network(other).into(),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TokenEndpointError::Timeout.into();
	}

	TokenEndpointError::network(err).into()
}

fn error_context(status: Option<u16>) -> ProviderErrorContext {
	match status {
		Some(status) => ProviderErrorContext::default().with_http_status(status),
		None => ProviderErrorContext::default(),
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}
