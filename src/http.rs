//! Transport primitives for every outbound provider call.
//!
//! The module exposes [`ProviderHttpClient`] alongside [`ResponseMetadata`] and
//! [`ResponseMetadataSlot`] so downstream crates can plug in custom HTTP clients. The same
//! handle type drives token exchanges (through the `oauth2` crate), JWKS fetches, and
//! logout calls. Implementations call [`ResponseMetadataSlot::take`] before dispatching a
//! request and [`ResponseMetadataSlot::store`] once an HTTP status is known, enabling
//! error mapping to report the provider's status consistently.

// std
use std::{ops::Deref, time::Duration as StdDuration};
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
// self
use crate::_prelude::*;

/// Request timeout applied to the default transport.
pub const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Abstraction over HTTP transports capable of executing provider requests while
/// publishing response metadata to the broker's error mapping.
///
/// The trait is the broker's only dependency on an HTTP stack. The broker requests
/// short-lived [`AsyncHttpClient`] handles that each carry a clone of a
/// [`ResponseMetadataSlot`]. Implementations must be `Send + Sync + 'static` so they can be
/// shared across brokers, and the handles they return must own whatever state is required
/// so their request futures remain `Send`.
///
/// Implementations are expected to bound every request with a timeout so a stalled
/// provider cannot hang a login attempt.
pub trait ProviderHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	///
	/// # Metadata Contract
	///
	/// - Call [`ResponseMetadataSlot::take`] before submitting the HTTP request so stale
	///   information never leaks across requests.
	/// - Once an HTTP response provides a status, save it with [`ResponseMetadataSlot::store`].
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the provider, if available.
	pub status: Option<u16>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Provider endpoints must answer directly, so the default client never follows
/// redirects and bounds every request by [`DEFAULT_REQUEST_TIMEOUT`]. Configure any custom
/// [`ReqwestClient`] the same way.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a client with the provided per-request timeout.
	pub fn with_timeout(timeout: StdDuration) -> Result<Self> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(crate::error::ConfigError::from)?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle::new(self.0.clone(), slot)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

#[cfg(feature = "reqwest")]
struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Handle returned by [`ReqwestHttpClient`] that satisfies [`ProviderHttpClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
#[cfg(feature = "reqwest")]
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self(Arc::new(InstrumentedHttpClient { client, slot }))
	}
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()) });

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
#[cfg(feature = "reqwest")]
impl ProviderHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		self.instrumented(slot)
	}
}

/// Builds a bodiless `GET` request accepting JSON.
pub(crate) fn get_json_request(url: &Url) -> Result<HttpRequest, oauth2::http::Error> {
	oauth2::http::Request::builder()
		.method(oauth2::http::Method::GET)
		.uri(url.as_str())
		.header(oauth2::http::header::ACCEPT, "application/json")
		.body(Vec::new())
}

/// Builds a form-encoded `POST` request.
pub(crate) fn post_form_request(
	url: &Url,
	form: &[(&str, &str)],
) -> Result<HttpRequest, oauth2::http::Error> {
	let body = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(form).finish();

	oauth2::http::Request::builder()
		.method(oauth2::http::Method::POST)
		.uri(url.as_str())
		.header(oauth2::http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
		.header(oauth2::http::header::ACCEPT, "application/json")
		.body(body.into_bytes())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn metadata_slot_is_consumed_on_take() {
		let slot = ResponseMetadataSlot::default();

		slot.store(ResponseMetadata { status: Some(204) });

		assert_eq!(slot.take().and_then(|meta| meta.status), Some(204));
		assert!(slot.take().is_none());
	}

	#[test]
	fn form_requests_are_url_encoded() {
		let url = Url::parse("https://idp.example.com/logout").expect("Logout URL should parse.");
		let request = post_form_request(&url, &[("client_id", "a b"), ("refresh_token", "r&t")])
			.expect("Form request should build.");

		assert_eq!(*request.method(), oauth2::http::Method::POST);
		assert_eq!(request.body().as_slice(), b"client_id=a+b&refresh_token=r%26t");
		assert_eq!(
			request.headers().get(oauth2::http::header::CONTENT_TYPE).map(|v| v.as_bytes()),
			Some(&b"application/x-www-form-urlencoded"[..])
		);
	}

	#[test]
	fn get_requests_have_empty_bodies() {
		let url = Url::parse("https://idp.example.com/jwks").expect("JWKS URL should parse.");
		let request = get_json_request(&url).expect("GET request should build.");

		assert_eq!(*request.method(), oauth2::http::Method::GET);
		assert!(request.body().is_empty());
		assert_eq!(request.uri(), "https://idp.example.com/jwks");
	}
}
