//! Access credential storage and decoding.
//!
//! The access token lives only in memory. The long-lived refresh secret is an
//! httpOnly cookie managed by the server and never touches this crate.

mod claims;
mod store;

pub use claims::{decode, Claims};
pub use store::TokenStore;
