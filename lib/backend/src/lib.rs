//! Hosted backend adapter for gymdesk.
//!
//! `BackendClient` speaks to a hosted auth service (`/auth/v1`) and a
//! PostgREST-style data API (`/rest/v1`). One client implements:
//! - `SessionProvider`, holding the signed-in principal's access token
//! - `RoleDirectory`, reading the `role` column of the account row
//! - `StudentStore` and `AccountStore`
//! - `ChangeFeed`, announcing writes made through this client
//!
//! `HttpMailer` delivers student broadcasts through an HTTP mail relay.

mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod mail;
mod rest;

pub use client::BackendClient;
pub use config::BackendConfig;
pub use error::BackendError;
pub use mail::HttpMailer;
