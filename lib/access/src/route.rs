//! Navigable screens and the table that gates them.
//!
//! The permitted set is computed from `(identity present, role lookup)` by
//! walking `ROUTE_TABLE`; there is no per-screen branching anywhere else.

use crate::role::{Role, RoleLookup};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A screen the navigator can register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Login,
    Dashboard,
    RegisterUser,
    CreateStudent,
    EditStudent,
    ListUsers,
    EditUser,
}

impl Route {
    /// Every route, in navigator order.
    pub const ALL: [Route; 7] = [
        Route::Login,
        Route::Dashboard,
        Route::RegisterUser,
        Route::CreateStudent,
        Route::EditStudent,
        Route::ListUsers,
        Route::EditUser,
    ];

    /// Returns the requirement a session must meet to reach this route.
    #[must_use]
    pub fn requirement(self) -> RouteRequirement {
        ROUTE_TABLE
            .iter()
            .find(|(route, _)| *route == self)
            .map_or(RouteRequirement::Never, |(_, requirement)| *requirement)
    }

    /// Returns true if reaching this route depends on a resolved role.
    #[must_use]
    pub fn is_privileged(self) -> bool {
        matches!(self.requirement(), RouteRequirement::AnyRole(_))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Login => "Login",
            Self::Dashboard => "Dashboard",
            Self::RegisterUser => "RegisterUser",
            Self::CreateStudent => "CreateStudent",
            Self::EditStudent => "EditStudent",
            Self::ListUsers => "ListUsers",
            Self::EditUser => "EditUser",
        };
        f.write_str(name)
    }
}

/// Predicate over `(identity present, role lookup)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRequirement {
    /// Only reachable with no identity.
    SignedOut,
    /// Reachable by any confirmed identity, whatever its role.
    SignedIn,
    /// Reachable by a confirmed identity whose role is in the list.
    AnyRole(&'static [Role]),
    /// Never reachable.
    Never,
}

impl RouteRequirement {
    /// Evaluates the predicate.
    #[must_use]
    pub fn admits(&self, identity_present: bool, role: RoleLookup) -> bool {
        match self {
            Self::SignedOut => !identity_present,
            Self::SignedIn => identity_present,
            Self::AnyRole(roles) => {
                identity_present && role.role().is_some_and(|role| roles.contains(&role))
            }
            Self::Never => false,
        }
    }
}

/// Route → requirement table.
pub const ROUTE_TABLE: &[(Route, RouteRequirement)] = &[
    (Route::Login, RouteRequirement::SignedOut),
    (Route::Dashboard, RouteRequirement::SignedIn),
    (
        Route::RegisterUser,
        RouteRequirement::AnyRole(&[Role::Administrator]),
    ),
    (
        Route::CreateStudent,
        RouteRequirement::AnyRole(&[Role::Administrator, Role::Instructor]),
    ),
    (
        Route::EditStudent,
        RouteRequirement::AnyRole(&[Role::Administrator]),
    ),
    (
        Route::ListUsers,
        RouteRequirement::AnyRole(&[Role::Administrator]),
    ),
    (
        Route::EditUser,
        RouteRequirement::AnyRole(&[Role::Administrator]),
    ),
];

/// The set of routes reachable in a given access state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteSet(BTreeSet<Route>);

impl RouteSet {
    /// A set with no routes. Published while navigation is blocked.
    #[must_use]
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// Returns true if the route is in the set.
    #[must_use]
    pub fn contains(&self, route: Route) -> bool {
        self.0.contains(&route)
    }

    /// Returns true if no route is reachable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates the routes in navigator order.
    pub fn iter(&self) -> impl Iterator<Item = Route> + '_ {
        self.0.iter().copied()
    }

    /// Returns true if any role-gated route is in the set.
    #[must_use]
    pub fn has_privileged(&self) -> bool {
        self.iter().any(Route::is_privileged)
    }
}

impl FromIterator<Route> for RouteSet {
    fn from_iter<I: IntoIterator<Item = Route>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for RouteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|r| r.to_string()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// Derives the reachable routes from identity presence and role.
///
/// Pure: the result depends only on the two arguments.
#[must_use]
pub fn derive_route_set(identity_present: bool, role: RoleLookup) -> RouteSet {
    // A role is never trusted without an identity.
    let role = if identity_present {
        role
    } else {
        RoleLookup::Unresolved
    };
    ROUTE_TABLE
        .iter()
        .filter(|(_, requirement)| requirement.admits(identity_present, role))
        .map(|(route, _)| *route)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOOKUPS: [RoleLookup; 4] = [
        RoleLookup::Unresolved,
        RoleLookup::Absent,
        RoleLookup::Resolved(Role::Administrator),
        RoleLookup::Resolved(Role::Instructor),
    ];

    #[test]
    fn signed_out_only_reaches_login() {
        for role in LOOKUPS {
            let routes = derive_route_set(false, role);
            assert_eq!(routes, RouteSet::from_iter([Route::Login]), "role {role}");
        }
    }

    #[test]
    fn unresolved_role_only_reaches_dashboard() {
        let routes = derive_route_set(true, RoleLookup::Unresolved);
        assert_eq!(routes, RouteSet::from_iter([Route::Dashboard]));
        assert!(!routes.has_privileged());
    }

    #[test]
    fn absent_role_only_reaches_dashboard() {
        let routes = derive_route_set(true, RoleLookup::Absent);
        assert_eq!(routes, RouteSet::from_iter([Route::Dashboard]));
    }

    #[test]
    fn administrator_reaches_the_full_privileged_set() {
        let routes = derive_route_set(true, RoleLookup::Resolved(Role::Administrator));
        assert_eq!(
            routes,
            RouteSet::from_iter([
                Route::Dashboard,
                Route::RegisterUser,
                Route::CreateStudent,
                Route::EditStudent,
                Route::ListUsers,
                Route::EditUser,
            ])
        );
        assert_eq!(routes.len(), 6);
        assert!(!routes.contains(Route::Login));
    }

    #[test]
    fn instructor_reaches_dashboard_and_student_creation() {
        let routes = derive_route_set(true, RoleLookup::Resolved(Role::Instructor));
        assert_eq!(
            routes,
            RouteSet::from_iter([Route::Dashboard, Route::CreateStudent])
        );
        for denied in [
            Route::RegisterUser,
            Route::EditStudent,
            Route::ListUsers,
            Route::EditUser,
        ] {
            assert!(!routes.contains(denied), "{denied} must be withheld");
        }
    }

    #[test]
    fn every_route_has_a_table_entry() {
        for route in Route::ALL {
            assert_ne!(route.requirement(), RouteRequirement::Never, "{route}");
        }
    }

    #[test]
    fn privileged_routes_are_role_gated() {
        assert!(!Route::Login.is_privileged());
        assert!(!Route::Dashboard.is_privileged());
        assert!(Route::CreateStudent.is_privileged());
        assert!(Route::EditUser.is_privileged());
    }

    #[test]
    fn route_set_display() {
        let routes = RouteSet::from_iter([Route::CreateStudent, Route::Dashboard]);
        assert_eq!(routes.to_string(), "{Dashboard, CreateStudent}");
        assert_eq!(RouteSet::empty().to_string(), "{}");
    }
}
