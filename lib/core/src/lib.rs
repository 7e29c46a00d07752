//! Core domain types and utilities for gymdesk.
//!
//! This crate provides the identifier types and the error-handling alias
//! shared by the access controller, the roster services, and the hosted
//! backend adapter.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, StudentId, UserId};
