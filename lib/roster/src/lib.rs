//! Students, staff accounts and the screens that manage them.
//!
//! This crate provides:
//! - Student and account records with their form drafts and validation
//! - Record store traits (`StudentStore`, `AccountStore`) and a change feed
//! - `StudentScreen` and `AccountScreen`, which gate every operation on the
//!   caller's route set
//! - An in-memory roster for offline runs and tests
//! - The student email broadcast
//!
//! # Example
//!
//! ```
//! use gymdesk_roster::StudentDraft;
//!
//! let draft = StudentDraft {
//!     name: "Carla".to_string(),
//!     modality: "Muay Thai".to_string(),
//!     plan: "Mensal".to_string(),
//!     start_date: "05-03-2025".to_string(),
//!     ..StudentDraft::default()
//! };
//! let fields = draft.validate().expect("valid draft");
//! assert_eq!(fields.start_date.to_string(), "2025-03-05");
//! ```

pub mod account;
pub mod error;
pub mod feed;
pub mod memory;
pub mod notify;
pub mod screen;
pub mod store;
pub mod student;

pub use account::{Account, AccountChanges, AccountDraft, RegistrationDraft};
pub use error::{NotifyError, RosterError, StoreError};
pub use feed::{ChangeFeed, ChangeHub, ChangeKind, ChangeNotice, Subscription, Table};
pub use memory::InMemoryRoster;
pub use notify::{BroadcastReport, Mail, Mailer, Notice, notify_students};
pub use screen::{AccessContext, AccountScreen, AccountWatch, StudentScreen};
pub use store::{AccountStore, StudentStore};
pub use student::{
    EXPIRY_WARNING_DAYS, MembershipStatus, Plan, Student, StudentDraft, StudentFields,
    StudentFilter, parse_start_date,
};
