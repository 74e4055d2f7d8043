//! # Ticket Repository
//!
//! Repair tickets as seen by checkout: cost components, payments received,
//! delivery and warranty stamps. Parts cost is aggregated from
//! `ticket_parts` on every load.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tillpoint_core::{Money, ServiceTicket, TicketPart, TicketStatus, TicketStatusLogEntry};

const TICKET_SELECT: &str = r#"
    SELECT t.id, t.ticket_number, t.customer_id, t.device_description, t.status,
           t.estimated_cost_cents, t.final_cost_cents, t.labor_cost_cents,
           COALESCE((SELECT SUM(p.unit_cost_cents * p.quantity)
                     FROM ticket_parts p WHERE p.ticket_id = t.id), 0) AS parts_cost_cents,
           t.paid_cents, t.delivered_at, t.warranty_expires_at, t.created_at, t.updated_at
    FROM service_tickets t
"#;

/// Fields needed to open a ticket.
#[derive(Debug, Clone, Default)]
pub struct NewTicket {
    pub ticket_number: String,
    pub customer_id: Option<String>,
    pub device_description: String,
    pub estimated_cost: Money,
    pub final_cost: Money,
    pub labor_cost: Money,
}

/// Repository for repair tickets.
pub struct TicketRepository<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> TicketRepository<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        TicketRepository { conn }
    }

    /// Gets a ticket with its aggregated parts cost.
    pub async fn get(&mut self, id: &str) -> DbResult<Option<ServiceTicket>> {
        let sql = format!("{TICKET_SELECT} WHERE t.id = ?1");
        let ticket = sqlx::query_as::<_, ServiceTicket>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(ticket)
    }

    /// Opens a ticket in `received` status.
    pub async fn insert(&mut self, new: &NewTicket, actor_id: &str) -> DbResult<ServiceTicket> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(id = %id, ticket_number = %new.ticket_number, "Inserting service ticket");

        sqlx::query(
            r#"
            INSERT INTO service_tickets (
                id, ticket_number, customer_id, device_description, status,
                estimated_cost_cents, final_cost_cents, labor_cost_cents, paid_cents,
                delivered_at, warranty_expires_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, NULL, NULL, ?9, ?9)
            "#,
        )
        .bind(&id)
        .bind(&new.ticket_number)
        .bind(&new.customer_id)
        .bind(&new.device_description)
        .bind(TicketStatus::Received)
        .bind(new.estimated_cost.cents())
        .bind(new.final_cost.cents())
        .bind(new.labor_cost.cents())
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        self.log_status(&id, None, TicketStatus::Received, actor_id, None).await?;

        self.get(&id).await?.ok_or_else(|| DbError::not_found("ServiceTicket", id))
    }

    /// Adds a part to a ticket.
    pub async fn add_part(
        &mut self,
        ticket_id: &str,
        product_id: Option<&str>,
        description: &str,
        unit_cost: Money,
        quantity: i64,
    ) -> DbResult<TicketPart> {
        let part = TicketPart {
            id: Uuid::new_v4().to_string(),
            ticket_id: ticket_id.to_string(),
            product_id: product_id.map(str::to_string),
            description: description.to_string(),
            unit_cost_cents: unit_cost.cents(),
            quantity,
        };

        sqlx::query(
            r#"
            INSERT INTO ticket_parts (
                id, ticket_id, product_id, description, unit_cost_cents, quantity
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&part.id)
        .bind(&part.ticket_id)
        .bind(&part.product_id)
        .bind(&part.description)
        .bind(part.unit_cost_cents)
        .bind(part.quantity)
        .execute(&mut *self.conn)
        .await?;

        Ok(part)
    }

    /// Parts used on a ticket.
    pub async fn parts(&mut self, ticket_id: &str) -> DbResult<Vec<TicketPart>> {
        let parts = sqlx::query_as::<_, TicketPart>(
            r#"
            SELECT id, ticket_id, product_id, description, unit_cost_cents, quantity
            FROM ticket_parts
            WHERE ticket_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(ticket_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(parts)
    }

    pub async fn part(&mut self, part_id: &str) -> DbResult<Option<TicketPart>> {
        let part = sqlx::query_as::<_, TicketPart>(
            r#"
            SELECT id, ticket_id, product_id, description, unit_cost_cents, quantity
            FROM ticket_parts
            WHERE id = ?1
            "#,
        )
        .bind(part_id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(part)
    }

    /// Takes a part off a ticket. Stock is the caller's concern.
    pub async fn remove_part(&mut self, part_id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM ticket_parts WHERE id = ?1")
            .bind(part_id)
            .execute(&mut *self.conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("TicketPart", part_id));
        }
        Ok(())
    }

    /// Adds `amount` to what the ticket has been paid.
    pub async fn record_payment(&mut self, ticket_id: &str, amount: Money) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE service_tickets SET paid_cents = paid_cents + ?2, updated_at = ?3 \
             WHERE id = ?1",
        )
        .bind(ticket_id)
        .bind(amount.cents())
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ServiceTicket", ticket_id));
        }
        Ok(())
    }

    /// Marks a ticket delivered and stamps its warranty expiry.
    pub async fn mark_delivered(
        &mut self,
        ticket_id: &str,
        delivered_at: DateTime<Utc>,
        warranty_expires_at: DateTime<Utc>,
        actor_id: &str,
        note: Option<&str>,
    ) -> DbResult<()> {
        let from: TicketStatus =
            sqlx::query_scalar("SELECT status FROM service_tickets WHERE id = ?1")
                .bind(ticket_id)
                .fetch_optional(&mut *self.conn)
                .await?
                .ok_or_else(|| DbError::not_found("ServiceTicket", ticket_id))?;

        sqlx::query(
            r#"
            UPDATE service_tickets
            SET status = ?2, delivered_at = ?3, warranty_expires_at = ?4, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(ticket_id)
        .bind(TicketStatus::Delivered)
        .bind(delivered_at)
        .bind(warranty_expires_at)
        .execute(&mut *self.conn)
        .await?;

        debug!(ticket_id, %warranty_expires_at, "Ticket delivered");
        self.log_status(ticket_id, Some(from), TicketStatus::Delivered, actor_id, note)
            .await
    }

    /// Status history, oldest first.
    pub async fn status_log(&mut self, ticket_id: &str) -> DbResult<Vec<TicketStatusLogEntry>> {
        let rows = sqlx::query_as::<_, TicketStatusLogEntry>(
            r#"
            SELECT id, ticket_id, from_status, to_status, actor_id, note, created_at
            FROM ticket_status_log
            WHERE ticket_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(ticket_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows)
    }

    async fn log_status(
        &mut self,
        ticket_id: &str,
        from: Option<TicketStatus>,
        to: TicketStatus,
        actor_id: &str,
        note: Option<&str>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ticket_status_log (
                id, ticket_id, from_status, to_status, actor_id, note, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(ticket_id)
        .bind(from)
        .bind(to)
        .bind(actor_id)
        .bind(note)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }
}
