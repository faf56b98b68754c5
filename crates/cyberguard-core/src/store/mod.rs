//! Complaint persistence abstraction.
//!
//! The [`ComplaintStore`] trait is everything the filing pipeline, the
//! tracking lookup and the dashboard need from a backend. Records are
//! keyed by ticket and are immutable once inserted, apart from `status`
//! and `last_updated`, which belong to case management.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::{ComplaintRecord, ComplaintStatus, TicketId};

/// Backend failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with this ticket already exists.
    #[error("ticket {0} already exists")]
    Duplicate(TicketId),
    /// No record with this ticket.
    #[error("ticket {0} not found")]
    NotFound(TicketId),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Dashboard counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComplaintStats {
    pub total: u64,
    pub resolved: u64,
    /// Complaints still "Under Investigation".
    pub active: u64,
}

/// Abstract complaint store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](ComplaintStore::insert) | Persist a new record; fails on a duplicate ticket |
/// | [`fetch`](ComplaintStore::fetch) | Look up one record by ticket |
/// | [`update_status`](ComplaintStore::update_status) | Case-management status transition |
/// | [`stats`](ComplaintStore::stats) | Total / resolved / active counts |
#[async_trait]
pub trait ComplaintStore: Send + Sync {
    async fn insert(&self, record: &ComplaintRecord) -> Result<TicketId, StoreError>;

    async fn fetch(&self, ticket: &TicketId) -> Result<Option<ComplaintRecord>, StoreError>;

    async fn update_status(
        &self,
        ticket: &TicketId,
        status: ComplaintStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn stats(&self) -> Result<ComplaintStats, StoreError>;
}
