//! Exchange Web Services (EWS) mailbox access.
//!
//! A small SOAP client for the `FindItem` operation, enough to list the newest
//! messages of a distinguished folder with an OAuth access token.

pub mod client;
pub mod models;
pub mod soap;

pub use client::{ExchangeService, OAuthCredentials};
pub use models::{InboxMessage, ItemView, WellKnownFolderName};
