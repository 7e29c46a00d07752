//! gymdesk operator console.
//!
//! A line-oriented front end over the access controller and the roster
//! screens. Runs against the hosted backend, or fully in memory when
//! `GYMDESK__OFFLINE=true`.

pub mod app;
pub mod command;
pub mod config;
pub mod error;
pub mod render;
