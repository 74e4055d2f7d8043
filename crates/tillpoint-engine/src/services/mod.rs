//! # Engine Services
//!
//! Each module adds one group of operations to [`crate::Engine`]. Every
//! operation follows the same shape:
//!
//! ```text
//! validate input ──► db.begin() ──► preconditions ──► writes ──► outbox
//!                                         │                        │
//!                                    any error: drop → ROLLBACK    ▼
//!                                                      commit ──► emit events
//! ```

pub mod accounts;
pub mod checkout;
pub mod drawer;
pub mod outbox;
pub mod purchases;
pub mod rates;
pub mod returns;
pub mod stock;
pub mod tickets;
