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
use crate::models::product_entity;

lazy_static! {
    static ref PRODUCTS_CREATED: IntCounter = IntCounter::new(
        "products_created_total",
        "Total number of products created"
    )
    .expect("metric can be created");
    static ref PRODUCT_CREATION_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "product_creation_failures_total",
            "Total number of failed product creations"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Add a product to the acting user's company catalogue.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateProductCommand {
    pub actor: Principal,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Product name must be between 1 and 255 characters"
    ))]
    pub name: String,
    #[validate(length(
        min = 1,
        max = 64,
        message = "SKU must be between 1 and 64 characters"
    ))]
    pub sku: String,
}

#[async_trait::async_trait]
impl Command for CreateProductCommand {
    type Result = product_entity::Model;

    #[instrument(skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            PRODUCT_CREATION_FAILURES
                .with_label_values(&["validation_error"])
                .inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        if !policy::can_manage_products(&self.actor) {
            PRODUCT_CREATION_FAILURES
                .with_label_values(&["permission_denied"])
                .inc();
            return Err(ServiceError::PermissionDenied(
                "Not allowed to create product".to_string(),
            ));
        }

        let company_id = self.actor.company_id.ok_or_else(|| {
            PRODUCT_CREATION_FAILURES
                .with_label_values(&["validation_error"])
                .inc();
            ServiceError::ValidationError("Actor does not belong to a company".to_string())
        })?;

        let db = db_pool.as_ref();

        let product = self.create_product_in_db(db, company_id).await?;

        self.log_and_trigger_event(&event_sender, &product).await?;

        PRODUCTS_CREATED.inc();

        Ok(product)
    }
}

impl CreateProductCommand {
    #[instrument(skip(db))]
    async fn create_product_in_db(
        &self,
        db: &DatabaseConnection,
        company_id: Uuid,
    ) -> Result<product_entity::Model, ServiceError> {
        let now = Utc::now();
        let product = product_entity::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            name: Set(self.name.clone()),
            sku: Set(self.sku.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        product.insert(db).await.map_err(|e| {
            PRODUCT_CREATION_FAILURES
                .with_label_values(&["database_error"])
                .inc();
            error!("Failed to create product: {}", e);
            ServiceError::db_error(e)
        })
    }

    async fn log_and_trigger_event(
        &self,
        event_sender: &EventSender,
        product: &product_entity::Model,
    ) -> Result<(), ServiceError> {
        info!(
            product_id = %product.id,
            company_id = %product.company_id,
            sku = %product.sku,
            "Product created successfully"
        );
        event_sender
            .send(Event::ProductCreated(product.id))
            .await
            .map_err(|e| {
                PRODUCT_CREATION_FAILURES
                    .with_label_values(&["event_error"])
                    .inc();
                let msg = format!("Failed to send product created event: {}", e);
                error!("{}", msg);
                ServiceError::EventError(msg)
            })
    }
}
