use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{policy, Principal};
use crate::commands::Command;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::warehouse_entity;

lazy_static! {
    static ref WAREHOUSES_CREATED: IntCounter = IntCounter::new(
        "warehouses_created_total",
        "Total number of warehouses created"
    )
    .expect("metric can be created");
    static ref WAREHOUSE_CREATION_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "warehouse_creation_failures_total",
            "Total number of failed warehouse creations"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Create a warehouse inside the acting owner's company.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateWarehouseCommand {
    pub actor: Principal,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Warehouse name must be between 1 and 255 characters"
    ))]
    pub name: String,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Location must be between 1 and 255 characters"
    ))]
    pub location: String,
}

#[async_trait::async_trait]
impl Command for CreateWarehouseCommand {
    type Result = warehouse_entity::Model;

    #[instrument(skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            WAREHOUSE_CREATION_FAILURES
                .with_label_values(&["validation_error"])
                .inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        let company_id = self.actor.company_id.ok_or_else(|| {
            WAREHOUSE_CREATION_FAILURES
                .with_label_values(&["validation_error"])
                .inc();
            ServiceError::ValidationError("Actor does not belong to a company".to_string())
        })?;

        if !policy::can_create_warehouse(&self.actor, company_id) {
            WAREHOUSE_CREATION_FAILURES
                .with_label_values(&["permission_denied"])
                .inc();
            return Err(ServiceError::PermissionDenied(
                "Only owner can create warehouse".to_string(),
            ));
        }

        let db = db_pool.as_ref();

        let warehouse = self.create_warehouse_in_db(db, company_id).await?;

        self.log_and_trigger_event(&event_sender, &warehouse).await?;

        WAREHOUSES_CREATED.inc();

        Ok(warehouse)
    }
}

impl CreateWarehouseCommand {
    #[instrument(skip(db))]
    async fn create_warehouse_in_db(
        &self,
        db: &DatabaseConnection,
        company_id: Uuid,
    ) -> Result<warehouse_entity::Model, ServiceError> {
        let now = Utc::now();
        let warehouse = warehouse_entity::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            name: Set(self.name.clone()),
            location: Set(self.location.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        warehouse.insert(db).await.map_err(|e| {
            WAREHOUSE_CREATION_FAILURES
                .with_label_values(&["database_error"])
                .inc();
            error!("Failed to create warehouse: {}", e);
            ServiceError::db_error(e)
        })
    }

    async fn log_and_trigger_event(
        &self,
        event_sender: &EventSender,
        warehouse: &warehouse_entity::Model,
    ) -> Result<(), ServiceError> {
        info!(
            warehouse_id = %warehouse.id,
            company_id = %warehouse.company_id,
            "Warehouse created successfully"
        );
        event_sender
            .send(Event::WarehouseCreated(warehouse.id))
            .await
            .map_err(|e| {
                WAREHOUSE_CREATION_FAILURES
                    .with_label_values(&["event_error"])
                    .inc();
                let msg = format!("Failed to send warehouse created event: {}", e);
                error!("{}", msg);
                ServiceError::EventError(msg)
            })
    }
}
