//! Walks a user through every provider of a configured login chain from the terminal.
//!
//! Configure providers through `IDP_BROKER_PROVIDERS` and the per-provider variables
//! documented in `idp_broker::config`, open the printed URL, and paste the callback URL the
//! provider redirects to.

// std
use std::{io, sync::Arc};
// crates.io
use color_eyre::{Result, eyre::eyre};
// self
use idp_broker::{
	config::BrokerConfig,
	flows::{CallbackParams, NextStep},
	session::MemorySessionStore,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = BrokerConfig::from_env()?;
	let chain = config.build_chain(Arc::new(MemorySessionStore::default()))?;
	let first = config.providers.first().ok_or_else(|| eyre!("No provider is configured."))?;
	let request = chain.begin_login(&first.id).await?;
	let mut provider = request.provider;
	let mut authorize_url = request.authorize_url;

	loop {
		println!("Open {authorize_url} to sign in with {provider}.");
		println!("Paste the callback URL:");

		let mut line = String::new();

		io::stdin().read_line(&mut line)?;

		let callback = Url::parse(line.trim())?;
		let params = CallbackParams::from_url(&callback);

		if let Some(error) = params.error {
			return Err(eyre!("{provider} reported `{error}`."));
		}

		let state = params.state.ok_or_else(|| eyre!("Callback carried no state."))?;
		let code = params.code.ok_or_else(|| eyre!("Callback carried no code."))?;
		let step = chain.complete_login(&provider, &state, &code).await?;

		println!("Signed in with {provider}:");

		for (name, value) in step.outcome.claims.iter() {
			println!("  {name}: {value}");
		}

		match step.next {
			NextStep::Redirect { provider: next, authorize_url: url } => {
				provider = next;
				authorize_url = url;
			},
			NextStep::Done => break,
			NextStep::Failed { provider: next, error } =>
				return Err(eyre!("Could not start the login at {next}: {error}")),
		}
	}

	println!("Login chain finished.");

	Ok(())
}
