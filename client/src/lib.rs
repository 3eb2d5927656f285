//! # Issuer Client
//!
//! Typed HTTP access to the attendance issuer/verifier. Every call is a thin
//! request wrapper: the crate keeps no state beyond the stored bearer token.
//!
//! - [`client::ApiClient`]: endpoint base, HTTP client and credential store.
//! - [`sessions`], [`attendance`], [`auth`]: one `impl ApiClient` block per resource.
//! - [`response`]: the `{ success, message, ... }` JSON envelopes.
//! - [`credentials`]: where the bearer token lives between runs.

pub mod attendance;
pub mod auth;
pub mod client;
pub mod credentials;
pub mod error;
pub mod models;
pub mod response;
pub mod sessions;

pub use client::ApiClient;
pub use error::ClientError;
