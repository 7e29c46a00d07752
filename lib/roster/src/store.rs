//! Record store traits.
//!
//! Listings come back newest first (descending id). Implementations are
//! expected to publish a change notice for every successful write when they
//! also implement `ChangeFeed`.

use crate::account::{Account, AccountChanges};
use crate::error::StoreError;
use crate::student::{Student, StudentFields, StudentFilter};
use async_trait::async_trait;
use gymdesk_core::{StudentId, UserId};

/// Persistent storage for students.
#[async_trait]
pub trait StudentStore: Send + Sync {
    /// Lists students passing `filter`, newest first.
    async fn list_students(&self, filter: &StudentFilter) -> Result<Vec<Student>, StoreError>;

    /// Fetches one student.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no student has this id.
    async fn get_student(&self, id: StudentId) -> Result<Student, StoreError>;

    /// Inserts a student and returns the stored record.
    async fn insert_student(
        &self,
        fields: StudentFields,
        instructor_id: Option<UserId>,
    ) -> Result<Student, StoreError>;

    /// Replaces a student's fields. The instructor link is left as is.
    async fn update_student(
        &self,
        id: StudentId,
        fields: StudentFields,
    ) -> Result<Student, StoreError>;

    /// Deletes a student.
    async fn delete_student(&self, id: StudentId) -> Result<(), StoreError>;
}

/// Persistent storage for staff accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Lists accounts, newest first.
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Fetches one account.
    async fn get_account(&self, id: &UserId) -> Result<Account, StoreError>;

    /// Inserts an account row.
    async fn insert_account(&self, account: Account) -> Result<Account, StoreError>;

    /// Applies edits to an account.
    async fn update_account(
        &self,
        id: &UserId,
        changes: AccountChanges,
    ) -> Result<Account, StoreError>;

    /// Deletes an account row. The principal itself is untouched.
    async fn delete_account(&self, id: &UserId) -> Result<(), StoreError>;
}
