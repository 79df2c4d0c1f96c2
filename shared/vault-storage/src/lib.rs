//! Client for the Vault-compatible secrets backend
//!
//! Exposes the key/value and PKI operations the CA engine needs behind the [`VaultApi`] trait,
//! an HTTP implementation and an authenticated session that renews its token in the background.

pub mod auth;
pub mod client;
pub mod error;

#[cfg(feature = "test-utils")]
pub mod mock;

pub use auth::{renewal_delay, AuthLease, AuthMethod, VaultSession};
pub use client::{VaultApi, VaultHttpClient};
pub use error::{VaultError, VaultResult};
