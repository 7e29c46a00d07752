//! Staff account records.
//!
//! An account row shares its id with the principal it describes and carries
//! the role the access controller looks up.

use crate::error::RosterError;
use gymdesk_access::Role;
use gymdesk_core::UserId;
use serde::{Deserialize, Serialize};

/// A stored staff account (`usuarios` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Same id as the principal.
    pub id: UserId,
    /// Display name.
    #[serde(rename = "nome")]
    pub name: String,
    /// Sign-in email.
    pub email: String,
    /// Contact phone.
    #[serde(rename = "telefone", default)]
    pub phone: Option<String>,
    /// Access level.
    pub role: Role,
}

/// Editable account fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountChanges {
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Unvalidated edit-account input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDraft {
    pub name: String,
    pub email: String,
    pub role: Option<Role>,
}

impl AccountDraft {
    /// Pre-fills a draft from a stored account.
    #[must_use]
    pub fn from_account(account: &Account) -> Self {
        Self {
            name: account.name.clone(),
            email: account.email.clone(),
            role: Some(account.role),
        }
    }

    /// Checks that name, email and role are present.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` for the first empty field.
    pub fn validate(&self) -> Result<AccountChanges, RosterError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(RosterError::MissingField { field: "name" });
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(RosterError::MissingField { field: "email" });
        }
        let role = self.role.ok_or(RosterError::MissingField { field: "role" })?;
        Ok(AccountChanges {
            name: name.to_string(),
            email: email.to_string(),
            role,
        })
    }
}

/// Unvalidated register-user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationDraft {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub role: Role,
}

impl RegistrationDraft {
    /// A draft for a new instructor, the default role on the register screen.
    #[must_use]
    pub fn instructor(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: String::new(),
            password: password.into(),
            role: Role::Instructor,
        }
    }

    /// Checks that name, email and password are present.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` for the first empty field.
    pub fn validate(&self) -> Result<(), RosterError> {
        for (field, value) in [
            ("name", &self.name),
            ("email", &self.email),
            ("password", &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(RosterError::MissingField { field });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_row_format() {
        let account = Account {
            id: UserId::from("u-1"),
            name: "Rafa".to_string(),
            email: "rafa@gym.test".to_string(),
            phone: None,
            role: Role::Administrator,
        };
        let json = serde_json::to_value(&account).expect("serialize");
        assert_eq!(json["nome"], "Rafa");
        assert_eq!(json["role"], "master");
    }

    #[test]
    fn account_draft_requires_role() {
        let draft = AccountDraft {
            name: "Rafa".to_string(),
            email: "rafa@gym.test".to_string(),
            role: None,
        };
        assert_eq!(
            draft.validate(),
            Err(RosterError::MissingField { field: "role" })
        );
    }

    #[test]
    fn account_draft_trims_fields() {
        let draft = AccountDraft {
            name: " Rafa ".to_string(),
            email: "rafa@gym.test ".to_string(),
            role: Some(Role::Instructor),
        };
        let changes = draft.validate().expect("valid");
        assert_eq!(changes.name, "Rafa");
        assert_eq!(changes.email, "rafa@gym.test");
    }

    #[test]
    fn registration_requires_password() {
        let draft = RegistrationDraft::instructor("Rafa", "rafa@gym.test", "");
        assert_eq!(
            draft.validate(),
            Err(RosterError::MissingField { field: "password" })
        );
        assert_eq!(draft.role, Role::Instructor);
    }
}
