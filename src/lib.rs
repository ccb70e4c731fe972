//! Stockflow: multi-tenant warehouse inventory management.
//!
//! Companies own warehouses and products; per-warehouse quantities live in
//! a versioned stock ledger. Stock moves either through direct employee
//! adjustments or through dual-approval transfers between warehouses of the
//! same company, which settle atomically and exactly once.
//!
//! Callers act as a [`auth::Principal`] supplied by an external
//! authentication layer; the access rules interpreting it live in
//! [`auth::policy`].

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod commands;
pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod models;
pub mod services;

/// Commonly used types for embedding the service.
pub mod prelude {
    pub use crate::auth::{Principal, Role};
    pub use crate::config::{init_tracing, load_config, AppConfig};
    pub use crate::db::{create_db_pool, run_migrations, DbPool};
    pub use crate::errors::ServiceError;
    pub use crate::events::{process_events, Event, EventSender};
    pub use crate::models::{MovementType, TransferSide, TransferStatus};
    pub use crate::services::AppServices;
}
