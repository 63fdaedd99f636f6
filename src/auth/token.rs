//! Token secrets and the token sets returned by code exchanges.

pub mod secret;
pub mod set;
