//! Resolution progress and the snapshot published to the rendering layer.

use crate::identity::Identity;
use crate::role::RoleLookup;
use crate::route::{RouteSet, derive_route_set};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The controller's own progress, separate from the values it resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum ResolutionState {
    /// A resolution is in flight.
    Loading,
    /// The latest identity and role are applied.
    Ready,
    /// The role lookup failed; navigation is blocked until a retry.
    Failed(String),
}

impl ResolutionState {
    /// Returns true while a resolution is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Returns true if the last resolution failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns the failure message, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            Self::Loading | Self::Ready => None,
        }
    }
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Ready => write!(f, "ready"),
            Self::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

/// What the rendering layer should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presentation {
    /// A spinner.
    Loading,
    /// A blocking panel with the literal failure message and a retry action.
    RetryPanel { message: String },
    /// Exactly one navigator registering these routes.
    Navigator { routes: RouteSet },
}

/// Immutable view of the controller state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessSnapshot {
    generation: u64,
    identity: Option<Identity>,
    role: RoleLookup,
    resolution: ResolutionState,
    routes: RouteSet,
}

impl AccessSnapshot {
    /// Builds a snapshot, deriving the routes from the other fields.
    ///
    /// Routes are empty unless the resolution is `Ready`: a loading or failed
    /// controller never exposes a stale set.
    #[must_use]
    pub fn new(
        generation: u64,
        identity: Option<Identity>,
        role: RoleLookup,
        resolution: ResolutionState,
    ) -> Self {
        let routes = match resolution {
            ResolutionState::Ready => derive_route_set(identity.is_some(), role),
            ResolutionState::Loading | ResolutionState::Failed(_) => RouteSet::empty(),
        };
        Self {
            generation,
            identity,
            role,
            resolution,
            routes,
        }
    }

    /// The initial snapshot before any resolution has run.
    #[must_use]
    pub fn initial() -> Self {
        Self::new(0, None, RoleLookup::Unresolved, ResolutionState::Loading)
    }

    /// The resolution session this snapshot belongs to.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The confirmed identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The role lookup for the identity.
    #[must_use]
    pub fn role(&self) -> RoleLookup {
        self.role
    }

    /// The controller's progress.
    #[must_use]
    pub fn resolution(&self) -> &ResolutionState {
        &self.resolution
    }

    /// The reachable routes.
    #[must_use]
    pub fn routes(&self) -> &RouteSet {
        &self.routes
    }

    /// Returns what the rendering layer should show.
    #[must_use]
    pub fn presentation(&self) -> Presentation {
        match &self.resolution {
            ResolutionState::Loading => Presentation::Loading,
            ResolutionState::Failed(message) => Presentation::RetryPanel {
                message: message.clone(),
            },
            ResolutionState::Ready => Presentation::Navigator {
                routes: self.routes.clone(),
            },
        }
    }
}
