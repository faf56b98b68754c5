//! In-memory [`ComplaintStore`] for tests and file-less runs.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{ComplaintRecord, ComplaintStatus, TicketId};

use super::{ComplaintStats, ComplaintStore, StoreError};

/// Records behind a `std::sync::RwLock`; nothing survives the process.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<TicketId, ComplaintRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ComplaintStore for InMemoryStore {
    async fn insert(&self, record: &ComplaintRecord) -> Result<TicketId, StoreError> {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(&record.ticket_id) {
            return Err(StoreError::Duplicate(record.ticket_id.clone()));
        }
        records.insert(record.ticket_id.clone(), record.clone());
        Ok(record.ticket_id.clone())
    }

    async fn fetch(&self, ticket: &TicketId) -> Result<Option<ComplaintRecord>, StoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(ticket).cloned())
    }

    async fn update_status(
        &self,
        ticket: &TicketId,
        status: ComplaintStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let record = records
            .get_mut(ticket)
            .ok_or_else(|| StoreError::NotFound(ticket.clone()))?;
        record.status = status;
        record.last_updated = at;
        Ok(())
    }

    async fn stats(&self) -> Result<ComplaintStats, StoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut stats = ComplaintStats {
            total: records.len() as u64,
            ..Default::default()
        };
        for record in records.values() {
            match record.status {
                ComplaintStatus::Resolved => stats.resolved += 1,
                ComplaintStatus::UnderInvestigation => stats.active += 1,
            }
        }
        Ok(stats)
    }
}
