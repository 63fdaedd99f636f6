//! Provider-facing descriptors (data) and strategies (behavior).
//!
//! `descriptor` exposes validated metadata (`ProviderDescriptor`) covering the client
//! registration, authorization/token/JWKS/logout endpoints, requested scopes, and provider
//! quirks (PKCE, access-token verification, signing family).
//! `strategy` defines [`ProviderStrategy`], an HTTP-client-agnostic hook used by flows to
//! classify token endpoint failures into the broker error taxonomy.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
