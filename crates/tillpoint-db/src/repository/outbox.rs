//! # Event Outbox Repository
//!
//! Domain events are written here in the same transaction as the change
//! that produced them, so a committed sale always has its event and a
//! rolled-back one never does.
//!
//! ## Outbox Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  unit of work                                                           │
//! │  ├── business writes                                                    │
//! │  └── enqueue(event)  ──► event_outbox (published_at = NULL)            ─│
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  downstream poller                                                     │
//! │  ├── pending(limit)                                                    │
//! │  └── mark_published(ids)                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use tillpoint_core::EventOutboxEntry;

pub struct OutboxRepository<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> OutboxRepository<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        OutboxRepository { conn }
    }

    /// Serializes `payload` to JSON and queues it.
    pub async fn enqueue<T: Serialize>(
        &mut self,
        event_type: &str,
        aggregate_id: &str,
        payload: &T,
    ) -> DbResult<EventOutboxEntry> {
        let entry = EventOutboxEntry {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            aggregate_id: aggregate_id.to_string(),
            payload: serde_json::to_string(payload)?,
            created_at: Utc::now(),
            published_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO event_outbox (
                id, event_type, aggregate_id, payload, created_at, published_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, NULL)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.event_type)
        .bind(&entry.aggregate_id)
        .bind(&entry.payload)
        .bind(entry.created_at)
        .execute(&mut *self.conn)
        .await?;

        debug!(id = %entry.id, event_type, aggregate_id, "Event queued in outbox");
        Ok(entry)
    }

    /// Unpublished events, oldest first.
    pub async fn pending(&mut self, limit: u32) -> DbResult<Vec<EventOutboxEntry>> {
        let rows = sqlx::query_as::<_, EventOutboxEntry>(
            r#"
            SELECT id, event_type, aggregate_id, payload, created_at, published_at
            FROM event_outbox
            WHERE published_at IS NULL
            ORDER BY rowid
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows)
    }

    /// Stamps events as delivered. Returns how many were updated.
    pub async fn mark_published(&mut self, ids: &[String]) -> DbResult<u64> {
        let now = Utc::now();
        let mut updated = 0;
        for id in ids {
            updated += sqlx::query(
                "UPDATE event_outbox SET published_at = ?2 WHERE id = ?1 AND published_at IS NULL",
            )
            .bind(id)
            .bind(now)
            .execute(&mut *self.conn)
            .await?
            .rows_affected();
        }
        Ok(updated)
    }
}
