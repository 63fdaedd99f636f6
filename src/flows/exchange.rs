//! Authorization code exchange.

// self
use crate::{
	_prelude::*,
	auth::TokenSet,
	flows::Broker,
	http::ProviderHttpClient,
	oauth::{BasicFacade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C, M> Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Exchanges an authorization code for tokens at the provider's token endpoint.
	///
	/// `pkce_verifier` must be the verifier whose challenge went into the authorization
	/// request; a provider that enforces PKCE answers a wrong or missing verifier with
	/// [`Error::InvalidGrant`]. The descriptor's redirect URI is sent along.
	pub async fn exchange_code(&self, code: &str, pkce_verifier: Option<&str>) -> Result<TokenSet> {
		const KIND: FlowKind = FlowKind::Exchange;

		let span = FlowSpan::new(KIND, "exchange_code");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(self.exchange(code, pkce_verifier, &self.descriptor.client.redirect_uri))
			.await;

		super::record_result(KIND, &result);

		result
	}

	pub(crate) async fn exchange(
		&self,
		code: &str,
		pkce_verifier: Option<&str>,
		redirect_uri: &Url,
	) -> Result<TokenSet> {
		let facade = <BasicFacade<C, M>>::from_descriptor(
			&self.descriptor,
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)?;

		facade
			.exchange_authorization_code(
				self.strategy.as_ref(),
				&self.descriptor.id,
				code,
				pkce_verifier,
				redirect_uri,
			)
			.await
	}
}
