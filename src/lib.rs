//! Local identity-provider broker: CSRF-safe OAuth 2.0/OIDC authorization code flows with
//! PKCE, code-for-token exchange, and JWKS-backed verification of the returned JWTs.
//!
//! The crate is organized leaf-first:
//!
//! - [`pkce`] generates verifier/challenge pairs.
//! - [`flows`] builds authorization redirects, validates callback state, exchanges codes, and
//!   sequences verification through [`flows::Broker`] (one per provider) and
//!   [`flows::LoginChain`] (provider chaining).
//! - [`jose`] fetches key sets, resolves keys by `kid`, and verifies tokens.
//! - [`session`] keeps per-attempt flow state keyed by the CSRF `state` value.
//! - [`config`] loads provider descriptors and broker knobs from JSON or the environment.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod jose;
pub mod oauth;
pub mod obs;
pub mod pkce;
pub mod provider;
pub mod session;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, ErrorKind, Result};
}

pub use jsonwebtoken;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
