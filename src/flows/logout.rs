//! Provider-side session termination.

// crates.io
use oauth2::AsyncHttpClient;
// self
use crate::{
	_prelude::*,
	auth::TokenSet,
	error::ConfigError,
	flows::Broker,
	http::{self, ProviderHttpClient, ResponseMetadataSlot},
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::{ClientAuthMethod, ProviderDescriptor},
};

impl<C, M> Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Ends the provider session that issued `tokens`.
	///
	/// Posts `client_id` and `refresh_token` to the descriptor's logout endpoint. Any
	/// non-2xx answer fails with [`Error::LogoutRejected`].
	pub async fn logout(&self, tokens: &TokenSet) -> Result<()> {
		const KIND: FlowKind = FlowKind::Logout;

		let span = FlowSpan::new(KIND, "logout");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.post_logout(tokens)).await;

		super::record_result(KIND, &result);

		result
	}

	async fn post_logout(&self, tokens: &TokenSet) -> Result<()> {
		let endpoint = self.descriptor.endpoints.logout.as_ref().ok_or_else(|| {
			ConfigError::MissingLogoutEndpoint { descriptor: self.descriptor.id.to_string() }
		})?;
		let refresh_token =
			tokens.refresh_token.as_ref().ok_or(ConfigError::MissingRefreshToken)?;
		let form = logout_form(&self.descriptor, refresh_token.expose());
		let request = http::post_form_request(endpoint, &form).map_err(ConfigError::from)?;
		let slot = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(slot.clone());
		let response = match handle.call(request).await {
			Ok(response) => response,
			Err(e) => {
				let meta = slot.take();

				return Err(self.transport_mapper.map_transport_error(meta.as_ref(), e));
			},
		};
		let status = response.status();

		if !status.is_success() {
			#[cfg(feature = "tracing")]
			tracing::warn!(
				provider = %self.descriptor.id,
				status = status.as_u16(),
				"logout endpoint rejected the request"
			);

			return Err(Error::LogoutRejected { status: status.as_u16() });
		}

		Ok(())
	}
}

fn logout_form<'a>(
	descriptor: &'a ProviderDescriptor,
	refresh_token: &'a str,
) -> Vec<(&'static str, &'a str)> {
	let mut form = vec![("client_id", descriptor.client.client_id.as_str())];
	let secret = descriptor
		.client
		.client_secret
		.as_ref()
		.filter(|_| descriptor.client_auth_method == ClientAuthMethod::ClientSecretPost);

	if let Some(secret) = secret {
		form.push(("client_secret", secret.expose()));
	}

	form.push(("refresh_token", refresh_token));

	form
}
