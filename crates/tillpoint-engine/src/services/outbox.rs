//! # Outbox Replay
//!
//! Events are emitted live right after commit. A subscriber that was not
//! listening (or a process that died between commit and emit) catches up
//! by replaying the outbox: pending rows are decoded, emitted again and
//! stamped as published in one unit of work. Delivery is at-least-once,
//! so an event may be seen twice.

use tracing::{info, warn};

use crate::error::EngineResult;
use crate::events::DomainEvent;
use crate::Engine;

impl Engine {
    /// Re-emits up to `limit` unpublished events, oldest first, and marks
    /// them published. Returns how many were emitted.
    ///
    /// Rows whose payload no longer decodes are marked published and
    /// skipped so they cannot block the queue.
    pub async fn publish_pending(&self, limit: u32) -> EngineResult<usize> {
        let mut uow = self.db.begin().await?;
        let pending = uow.outbox().pending(limit).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut ids = Vec::with_capacity(pending.len());
        let mut events = Vec::with_capacity(pending.len());
        for entry in pending {
            match serde_json::from_str::<DomainEvent>(&entry.payload) {
                Ok(event) => events.push(event),
                Err(e) => warn!(
                    id = %entry.id,
                    event_type = %entry.event_type,
                    error = %e,
                    "Skipping undecodable outbox entry"
                ),
            }
            ids.push(entry.id);
        }

        uow.outbox().mark_published(&ids).await?;
        let emitted = events.len();
        self.commit_and_publish(uow, events).await?;

        info!(emitted, marked = ids.len(), "Outbox replayed");
        Ok(emitted)
    }
}
