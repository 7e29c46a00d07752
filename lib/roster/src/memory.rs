//! In-process record store.
//!
//! Holds students and accounts in memory, publishes a change notice for every
//! write and answers role lookups from the account rows. Used for offline
//! runs and tests.

use crate::account::{Account, AccountChanges};
use crate::error::StoreError;
use crate::feed::{ChangeFeed, ChangeHub, ChangeKind, ChangeNotice, Subscription, Table};
use crate::store::{AccountStore, StudentStore};
use crate::student::{Student, StudentFields, StudentFilter};
use async_trait::async_trait;
use gymdesk_access::{LookupError, Role, RoleDirectory};
use gymdesk_core::{StudentId, UserId};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct RosterState {
    students: BTreeMap<StudentId, Student>,
    next_student: i64,
    // Insertion order stands in for the backend's ascending ids.
    accounts: Vec<Account>,
    offline: bool,
}

impl RosterState {
    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Unavailable {
                reason: "roster is offline".to_string(),
            });
        }
        Ok(())
    }

    fn account_mut(&mut self, id: &UserId) -> Result<&mut Account, StoreError> {
        self.accounts
            .iter_mut()
            .find(|account| &account.id == id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "account",
                id: id.to_string(),
            })
    }
}

/// Students, accounts and their change feed, kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryRoster {
    state: Mutex<RosterState>,
    hub: ChangeHub,
}

impl InMemoryRoster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation fail as if the backend were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Returns the number of open change feed subscriptions.
    #[must_use]
    pub fn watchers(&self) -> usize {
        self.hub.subscriber_count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RosterState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn notify(&self, table: Table, kind: ChangeKind) {
        debug!(%table, ?kind, "roster changed");
        self.hub.publish(ChangeNotice::new(table, kind));
    }
}

#[async_trait]
impl StudentStore for InMemoryRoster {
    async fn list_students(&self, filter: &StudentFilter) -> Result<Vec<Student>, StoreError> {
        let state = self.lock();
        state.check_online()?;
        Ok(state
            .students
            .values()
            .rev()
            .filter(|student| filter.matches(student))
            .cloned()
            .collect())
    }

    async fn get_student(&self, id: StudentId) -> Result<Student, StoreError> {
        let state = self.lock();
        state.check_online()?;
        state
            .students
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "student",
                id: id.to_string(),
            })
    }

    async fn insert_student(
        &self,
        fields: StudentFields,
        instructor_id: Option<UserId>,
    ) -> Result<Student, StoreError> {
        let student = {
            let mut state = self.lock();
            state.check_online()?;
            state.next_student += 1;
            let student = Student {
                id: StudentId::new(state.next_student),
                fields,
                instructor_id,
            };
            state.students.insert(student.id, student.clone());
            student
        };
        self.notify(Table::Students, ChangeKind::Insert);
        Ok(student)
    }

    async fn update_student(
        &self,
        id: StudentId,
        fields: StudentFields,
    ) -> Result<Student, StoreError> {
        let student = {
            let mut state = self.lock();
            state.check_online()?;
            let student = state
                .students
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound {
                    entity: "student",
                    id: id.to_string(),
                })?;
            student.fields = fields;
            student.clone()
        };
        self.notify(Table::Students, ChangeKind::Update);
        Ok(student)
    }

    async fn delete_student(&self, id: StudentId) -> Result<(), StoreError> {
        {
            let mut state = self.lock();
            state.check_online()?;
            state
                .students
                .remove(&id)
                .ok_or_else(|| StoreError::NotFound {
                    entity: "student",
                    id: id.to_string(),
                })?;
        }
        self.notify(Table::Students, ChangeKind::Delete);
        Ok(())
    }
}

#[async_trait]
impl AccountStore for InMemoryRoster {
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let state = self.lock();
        state.check_online()?;
        Ok(state.accounts.iter().rev().cloned().collect())
    }

    async fn get_account(&self, id: &UserId) -> Result<Account, StoreError> {
        let mut state = self.lock();
        state.check_online()?;
        state.account_mut(id).cloned()
    }

    async fn insert_account(&self, account: Account) -> Result<Account, StoreError> {
        {
            let mut state = self.lock();
            state.check_online()?;
            if state.accounts.iter().any(|existing| existing.id == account.id) {
                return Err(StoreError::Rejected {
                    reason: format!("account {} already exists", account.id),
                });
            }
            state.accounts.push(account.clone());
        }
        self.notify(Table::Accounts, ChangeKind::Insert);
        Ok(account)
    }

    async fn update_account(
        &self,
        id: &UserId,
        changes: AccountChanges,
    ) -> Result<Account, StoreError> {
        let account = {
            let mut state = self.lock();
            state.check_online()?;
            let account = state.account_mut(id)?;
            account.name = changes.name;
            account.email = changes.email;
            account.role = changes.role;
            account.clone()
        };
        self.notify(Table::Accounts, ChangeKind::Update);
        Ok(account)
    }

    async fn delete_account(&self, id: &UserId) -> Result<(), StoreError> {
        {
            let mut state = self.lock();
            state.check_online()?;
            let before = state.accounts.len();
            state.accounts.retain(|account| &account.id != id);
            if state.accounts.len() == before {
                return Err(StoreError::NotFound {
                    entity: "account",
                    id: id.to_string(),
                });
            }
        }
        self.notify(Table::Accounts, ChangeKind::Delete);
        Ok(())
    }
}

impl ChangeFeed for InMemoryRoster {
    fn subscribe(&self, table: Table) -> Subscription {
        self.hub.subscribe(table)
    }
}

#[async_trait]
impl RoleDirectory for InMemoryRoster {
    async fn role_of(&self, id: &UserId) -> Result<Option<Role>, LookupError> {
        let state = self.lock();
        if state.offline {
            return Err(LookupError::Query {
                reason: "roster is offline".to_string(),
            });
        }
        Ok(state
            .accounts
            .iter()
            .find(|account| &account.id == id)
            .map(|account| account.role))
    }
}
