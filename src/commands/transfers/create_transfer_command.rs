use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, Set, TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{policy, Principal};
use crate::commands::Command;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::product_entity::Entity as Product;
use crate::models::stock_transfer_entity::{self, TransferStatus};
use crate::models::warehouse_entity::Entity as Warehouse;

lazy_static! {
    static ref TRANSFERS_CREATED: IntCounter = IntCounter::new(
        "stock_transfers_created_total",
        "Total number of stock transfers created"
    )
    .expect("metric can be created");
    static ref TRANSFER_CREATION_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "stock_transfer_creation_failures_total",
            "Total number of failed stock transfer creations"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Open a pending transfer between two warehouses of the same company.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateTransferCommand {
    pub actor: Principal,
    pub product_id: Uuid,
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
}

#[async_trait::async_trait]
impl Command for CreateTransferCommand {
    type Result = stock_transfer_entity::Model;

    #[instrument(skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            TRANSFER_CREATION_FAILURES
                .with_label_values(&["validation_error"])
                .inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        if !policy::can_create_transfer(&self.actor) {
            TRANSFER_CREATION_FAILURES
                .with_label_values(&["permission_denied"])
                .inc();
            return Err(ServiceError::PermissionDenied(
                "Only manager or owner can create transfer".to_string(),
            ));
        }

        if self.from_warehouse_id == self.to_warehouse_id {
            TRANSFER_CREATION_FAILURES
                .with_label_values(&["validation_error"])
                .inc();
            return Err(ServiceError::ValidationError(
                "Source and destination cannot be the same".to_string(),
            ));
        }

        let db = db_pool.as_ref();

        let transfer = self.create_transfer_in_db(db).await?;

        self.log_and_trigger_event(&event_sender, &transfer).await?;

        TRANSFERS_CREATED.inc();

        Ok(transfer)
    }
}

impl CreateTransferCommand {
    #[instrument(skip(db))]
    async fn create_transfer_in_db(
        &self,
        db: &DatabaseConnection,
    ) -> Result<stock_transfer_entity::Model, ServiceError> {
        let product_id = self.product_id;
        let from_warehouse_id = self.from_warehouse_id;
        let to_warehouse_id = self.to_warehouse_id;
        let quantity = self.quantity;
        let actor = self.actor.clone();
        db.transaction::<_, stock_transfer_entity::Model, ServiceError>(|txn| {
            Box::pin(async move {
                let from_warehouse = Warehouse::find_by_id(from_warehouse_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "Warehouse {} not found",
                            from_warehouse_id
                        ))
                    })?;
                let to_warehouse = Warehouse::find_by_id(to_warehouse_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "Warehouse {} not found",
                            to_warehouse_id
                        ))
                    })?;

                stock_transfer_entity::validate_routing(&from_warehouse, &to_warehouse)?;

                if !actor.is_superuser
                    && actor.company_id != Some(from_warehouse.company_id)
                {
                    return Err(ServiceError::PermissionDenied(
                        "Cannot create transfers outside your own company".to_string(),
                    ));
                }

                Product::find_by_id(product_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Product {} not found", product_id))
                    })?;

                let now = Utc::now();
                let transfer = stock_transfer_entity::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    product_id: Set(product_id),
                    from_warehouse_id: Set(from_warehouse_id),
                    to_warehouse_id: Set(to_warehouse_id),
                    quantity: Set(quantity),
                    created_by: Set(actor.user_id),
                    out_approved: Set(false),
                    in_approved: Set(false),
                    status: Set(TransferStatus::Pending),
                    created_at: Set(now),
                    updated_at: Set(now),
                };

                transfer.insert(txn).await.map_err(ServiceError::db_error)
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => {
                TRANSFER_CREATION_FAILURES
                    .with_label_values(&["database_error"])
                    .inc();
                error!("Database error during transfer creation: {}", db_err);
                ServiceError::DatabaseError(db_err)
            }
            TransactionError::Transaction(service_err) => {
                TRANSFER_CREATION_FAILURES
                    .with_label_values(&[service_err.kind()])
                    .inc();
                error!("Stock transfer creation failed: {}", service_err);
                service_err
            }
        })
    }

    async fn log_and_trigger_event(
        &self,
        event_sender: &EventSender,
        transfer: &stock_transfer_entity::Model,
    ) -> Result<(), ServiceError> {
        info!(
            transfer_id = %transfer.id,
            product_id = %transfer.product_id,
            from_warehouse_id = %transfer.from_warehouse_id,
            to_warehouse_id = %transfer.to_warehouse_id,
            quantity = transfer.quantity,
            "Stock transfer created successfully"
        );
        event_sender
            .send(Event::TransferCreated(transfer.id))
            .await
            .map_err(|e| {
                TRANSFER_CREATION_FAILURES
                    .with_label_values(&["event_error"])
                    .inc();
                let msg = format!("Failed to send transfer created event: {}", e);
                error!("{}", msg);
                ServiceError::EventError(msg)
            })
    }
}
