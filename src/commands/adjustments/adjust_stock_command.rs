use std::sync::Arc;

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use sea_orm::{DatabaseConnection, EntityTrait, TransactionError, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::auth::Principal;
use crate::commands::Command;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::product_entity::Entity as Product;
use crate::models::stock_movement_entity::MovementType;
use crate::models::{stock_level_entity, stock_movement_entity};
use crate::services::stock_ledger;

lazy_static! {
    static ref STOCK_ADJUSTMENTS: IntCounter = IntCounter::new(
        "stock_adjustments_total",
        "Total number of direct stock adjustments"
    )
    .expect("metric can be created");
    static ref STOCK_ADJUSTMENT_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "stock_adjustment_failures_total",
            "Total number of failed direct stock adjustments"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Direct stock correction against the actor's own warehouse.
///
/// Only an employee may run this, and only against the warehouse they are
/// assigned to; the target warehouse is taken from the assignment, never
/// from the input.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AdjustStockCommand {
    pub actor: Principal,
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    pub operation: MovementType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustStockResult {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    /// Quantity on hand after the adjustment.
    pub quantity: i32,
    pub operation: MovementType,
    pub movement_id: Uuid,
}

#[async_trait::async_trait]
impl Command for AdjustStockCommand {
    type Result = AdjustStockResult;

    #[instrument(skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            STOCK_ADJUSTMENT_FAILURES
                .with_label_values(&["validation_error"])
                .inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        if !self.actor.is_employee() {
            STOCK_ADJUSTMENT_FAILURES
                .with_label_values(&["permission_denied"])
                .inc();
            return Err(ServiceError::PermissionDenied(
                "Only warehouse employees can adjust stock directly".to_string(),
            ));
        }

        let warehouse_id = self.actor.assigned_warehouse_id.ok_or_else(|| {
            STOCK_ADJUSTMENT_FAILURES
                .with_label_values(&["not_assigned"])
                .inc();
            ServiceError::NotAssigned("You are not assigned to any warehouse".to_string())
        })?;

        let db = db_pool.as_ref();

        let (movement, level, previous_quantity) = self.adjust_in_db(db, warehouse_id).await?;

        self.log_and_trigger_event(&event_sender, &movement, &level, previous_quantity)
            .await?;

        STOCK_ADJUSTMENTS.inc();

        Ok(AdjustStockResult {
            product_id: self.product_id,
            warehouse_id,
            quantity: level.quantity,
            operation: self.operation,
            movement_id: movement.id,
        })
    }
}

impl AdjustStockCommand {
    #[instrument(skip(db))]
    async fn adjust_in_db(
        &self,
        db: &DatabaseConnection,
        warehouse_id: Uuid,
    ) -> Result<(stock_movement_entity::Model, stock_level_entity::Model, i32), ServiceError> {
        let product_id = self.product_id;
        let quantity = self.quantity;
        let operation = self.operation;
        db.transaction::<_, (stock_movement_entity::Model, stock_level_entity::Model, i32), ServiceError>(|txn| {
            Box::pin(async move {
                Product::find_by_id(product_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Product {} not found", product_id))
                    })?;

                let previous_quantity =
                    stock_ledger::quantity_of(txn, warehouse_id, product_id).await?;

                let level = match operation {
                    MovementType::In => {
                        stock_ledger::credit(txn, warehouse_id, product_id, quantity)
                            .await?
                    }
                    MovementType::Out => {
                        stock_ledger::debit(txn, warehouse_id, product_id, quantity)
                            .await?
                    }
                };

                let movement = stock_ledger::record_movement(
                    txn,
                    warehouse_id,
                    product_id,
                    operation,
                    quantity,
                    Some("direct_adjustment".to_string()),
                    None,
                )
                .await?;

                Ok((movement, level, previous_quantity))
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => {
                STOCK_ADJUSTMENT_FAILURES
                    .with_label_values(&["database_error"])
                    .inc();
                error!("Database error during stock adjustment: {}", db_err);
                ServiceError::DatabaseError(db_err)
            }
            TransactionError::Transaction(service_err) => {
                STOCK_ADJUSTMENT_FAILURES
                    .with_label_values(&[service_err.kind()])
                    .inc();
                error!("Stock adjustment failed: {}", service_err);
                service_err
            }
        })
    }

    async fn log_and_trigger_event(
        &self,
        event_sender: &EventSender,
        movement: &stock_movement_entity::Model,
        level: &stock_level_entity::Model,
        previous_quantity: i32,
    ) -> Result<(), ServiceError> {
        info!(
            warehouse_id = %level.warehouse_id,
            product_id = %self.product_id,
            operation = %self.operation,
            quantity = self.quantity,
            new_quantity = level.quantity,
            "Stock adjusted successfully"
        );
        event_sender
            .send(Event::StockAdjusted {
                warehouse_id: level.warehouse_id,
                product_id: self.product_id,
                movement_id: movement.id,
                movement_type: self.operation,
                old_quantity: previous_quantity,
                new_quantity: level.quantity,
            })
            .await
            .map_err(|e| {
                STOCK_ADJUSTMENT_FAILURES
                    .with_label_values(&["event_error"])
                    .inc();
                let msg = format!("Failed to send stock adjusted event: {}", e);
                error!("{}", msg);
                ServiceError::EventError(msg)
            })
    }
}
