//! Write operations, one command per state change.
//!
//! Each command owns its validation, authorization and database work, emits
//! an event after the change commits, and tracks success/failure counters.

use std::sync::Arc;

use async_trait::async_trait;

use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;

pub mod adjustments;
pub mod tenancy;
pub mod transfers;

/// A self-contained write operation.
#[async_trait]
pub trait Command: Send + Sync {
    type Result;

    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError>;
}
