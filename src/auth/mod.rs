//! Microsoft identity platform authentication module.
//!
//! Provides the confidential OAuth2 client for the authorization code flow,
//! the token set it produces, and the in-memory store for the latest token set.

pub mod oauth;
pub mod result;
pub mod token_store;
