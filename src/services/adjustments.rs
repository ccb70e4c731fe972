use std::sync::Arc;

use uuid::Uuid;

use crate::auth::Principal;
use crate::commands::adjustments::{AdjustStockCommand, AdjustStockResult};
use crate::commands::Command;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::models::MovementType;

/// Direct stock corrections by warehouse employees.
#[derive(Clone)]
pub struct StockAdjustmentService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl StockAdjustmentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Credit or debit the actor's assigned warehouse by `quantity` units.
    pub async fn adjust(
        &self,
        actor: Principal,
        product_id: Uuid,
        quantity: i32,
        operation: MovementType,
    ) -> Result<AdjustStockResult, ServiceError> {
        let command = AdjustStockCommand {
            actor,
            product_id,
            quantity,
            operation,
        };
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }
}
