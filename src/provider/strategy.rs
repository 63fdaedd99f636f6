//! Provider strategy hooks that customize exchanges and classify failures.
//!
//! Implementations decorate outgoing requests and normalize error mapping without tying
//! flows to any particular HTTP client.

// self
use crate::_prelude::*;

/// Strategy hook that allows providers to decorate requests and classify errors.
///
/// Implementors are required to be `Send + Sync`, and the hooks use crate-owned data
/// types so downstream crates never depend on reqwest-specific structures. Only
/// `classify_token_error` is mandatory.
pub trait ProviderStrategy: Send + Sync {
	/// Maps a failed token exchange into the broker taxonomy.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;

	/// Adds provider-specific query parameters to the authorization URL.
	fn augment_authorization_request(&self, _params: &mut BTreeMap<String, String>) {}

	/// Adds provider-specific form parameters to the token exchange.
	fn augment_token_request(&self, _form: &mut BTreeMap<String, String>) {}
}

/// Canonical provider error categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// Provider rejected the authorization code or PKCE verifier.
	InvalidGrant,
	/// Anything else: client misconfiguration, outages, unexpected responses.
	Endpoint,
}

/// Context passed to provider strategies when classifying token errors.
///
/// The struct keeps only primitive data (status codes, OAuth fields, body preview) so
/// strategies stay decoupled from any HTTP client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Preview of the response body for non-JSON payloads.
	pub body_preview: Option<String>,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Adds an HTTP status code (e.g., 400, 401, 500).
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth error code string returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a body preview for providers that return non-JSON payloads.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}
}

/// Default strategy that applies RFC 6749 §5.2 heuristics.
///
/// Structured OAuth fields win, then body hints. Only `invalid_grant` (and the equivalent
/// `access_denied`) count as grant rejections; a bare status code never does.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-provider-strategy")
	}
}
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if let Some(kind) = ctx.oauth_error.as_deref().and_then(match_exact_value) {
			return kind;
		}
		if let Some(kind) = ctx
			.error_description
			.as_deref()
			.and_then(match_exact_value)
			.or_else(|| classify_body(ctx.error_description.as_deref()))
			.or_else(|| classify_body(ctx.body_preview.as_deref()))
		{
			return kind;
		}

		ProviderErrorKind::Endpoint
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= ProviderErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf =
		body.chars().take(ProviderErrorContext::BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

fn match_exact_value(value: &str) -> Option<ProviderErrorKind> {
	if value.eq_ignore_ascii_case("invalid_grant") || value.eq_ignore_ascii_case("access_denied") {
		Some(ProviderErrorKind::InvalidGrant)
	} else if value.eq_ignore_ascii_case("invalid_client")
		|| value.eq_ignore_ascii_case("unauthorized_client")
		|| value.eq_ignore_ascii_case("invalid_request")
		|| value.eq_ignore_ascii_case("server_error")
		|| value.eq_ignore_ascii_case("temporarily_unavailable")
	{
		Some(ProviderErrorKind::Endpoint)
	} else {
		None
	}
}

fn classify_body(body: Option<&str>) -> Option<ProviderErrorKind> {
	let lowered = body?.to_ascii_lowercase();

	if lowered.contains("invalid_grant") || lowered.contains("code_verifier") {
		Some(ProviderErrorKind::InvalidGrant)
	} else {
		None
	}
}
