//! Change notifications for stored records.
//!
//! A `ChangeHub` fans notices out to every `Subscription`. Each subscription
//! only yields notices for the table it was opened on. A subscriber that
//! falls behind gets a single `Resync` notice in place of the ones it missed.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::debug;

const HUB_CAPACITY: usize = 64;

/// A watched table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Table {
    #[serde(rename = "alunos")]
    Students,
    #[serde(rename = "usuarios")]
    Accounts,
}

impl Table {
    /// Returns the backend table name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Students => "alunos",
            Self::Accounts => "usuarios",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// Notices were dropped; refetch everything.
    Resync,
}

/// A single change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub table: Table,
    pub kind: ChangeKind,
}

impl ChangeNotice {
    #[must_use]
    pub fn new(table: Table, kind: ChangeKind) -> Self {
        Self { table, kind }
    }
}

/// A source of change notifications.
pub trait ChangeFeed: Send + Sync {
    /// Opens a subscription to one table.
    fn subscribe(&self, table: Table) -> Subscription;
}

/// Broadcast point for change notices.
#[derive(Debug, Clone)]
pub struct ChangeHub {
    sender: broadcast::Sender<ChangeNotice>,
}

impl ChangeHub {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(HUB_CAPACITY);
        Self { sender }
    }

    /// Publishes a notice to all open subscriptions.
    pub fn publish(&self, notice: ChangeNotice) {
        // No subscribers is fine.
        let _ = self.sender.send(notice);
    }

    /// Returns the number of open subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed for ChangeHub {
    fn subscribe(&self, table: Table) -> Subscription {
        debug!(%table, "change feed subscription opened");
        Subscription {
            table,
            stream: BroadcastStream::new(self.sender.subscribe()),
        }
    }
}

/// An open subscription to one table's changes.
pub struct Subscription {
    table: Table,
    stream: BroadcastStream<ChangeNotice>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Returns the subscribed table.
    #[must_use]
    pub fn table(&self) -> Table {
        self.table
    }

    /// Waits for the next notice on this table.
    ///
    /// Returns `None` once the hub is gone.
    pub async fn next(&mut self) -> Option<ChangeNotice> {
        while let Some(item) = self.stream.next().await {
            match item {
                Ok(notice) if notice.table == self.table => return Some(notice),
                Ok(_) => {}
                Err(BroadcastStreamRecvError::Lagged(missed)) => {
                    debug!(table = %self.table, missed, "change feed lagged");
                    return Some(ChangeNotice::new(self.table, ChangeKind::Resync));
                }
            }
        }
        None
    }

    /// Closes the subscription.
    pub fn unsubscribe(self) {
        debug!(table = %self.table, "change feed subscription closed");
    }
}
