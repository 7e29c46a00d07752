//! Session resolution and role-gated navigation for gymdesk.
//!
//! This crate provides:
//! - Signed-in principals (`Identity`) and sign-in credentials
//! - Staff roles (`Role`) and the progress of their lookup (`RoleLookup`)
//! - The route table and `RouteSet` derivation
//! - The `AccessController`, which resolves identity then role and publishes
//!   the reachable routes
//! - The collaborator traits it consumes (`SessionProvider`, `RoleDirectory`)
//!
//! # Access Model
//!
//! Signed-out principals only reach Login. A signed-in principal reaches the
//! Dashboard; everything else is gated on the role stored on their account
//! row. A failed role lookup blocks navigation until an operator retries.
//!
//! # Example
//!
//! ```
//! use gymdesk_access::{Role, RoleLookup, Route, derive_route_set};
//!
//! let routes = derive_route_set(true, RoleLookup::Resolved(Role::Instructor));
//! assert!(routes.contains(Route::CreateStudent));
//! assert!(!routes.contains(Route::ListUsers));
//!
//! let routes = derive_route_set(false, RoleLookup::Resolved(Role::Administrator));
//! assert!(routes.contains(Route::Login));
//! assert_eq!(routes.len(), 1);
//! ```

pub mod controller;
pub mod error;
pub mod identity;
pub mod memory;
pub mod provider;
pub mod retry;
pub mod role;
pub mod route;
pub mod state;

// Re-export main types at crate root
pub use controller::AccessController;
pub use error::{AccessError, AccessFault, LookupError, Phase, SessionError};
pub use identity::{Credential, Identity, Registration};
pub use memory::LocalSessions;
pub use provider::{RoleDirectory, SessionEvent, SessionProvider};
pub use retry::RetryPolicy;
pub use role::{Role, RoleLookup, UnknownRole};
pub use route::{ROUTE_TABLE, Route, RouteRequirement, RouteSet, derive_route_set};
pub use state::{AccessSnapshot, Presentation, ResolutionState};
