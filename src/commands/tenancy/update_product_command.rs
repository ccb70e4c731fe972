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
use crate::models::product_entity::{self, Entity as Product};

lazy_static! {
    static ref PRODUCT_UPDATES: IntCounter = IntCounter::new(
        "product_updates_total",
        "Total number of product updates"
    )
    .expect("metric can be created");
    static ref PRODUCT_UPDATE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "product_update_failures_total",
            "Total number of failed product updates"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Partial update of a product's catalogue fields.
///
/// Products of other companies read as not found rather than forbidden, so
/// the response does not leak which identifiers exist elsewhere.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateProductCommand {
    pub actor: Principal,
    pub product_id: Uuid,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Product name must be between 1 and 255 characters"
    ))]
    pub name: Option<String>,
    #[validate(length(
        min = 1,
        max = 64,
        message = "SKU must be between 1 and 64 characters"
    ))]
    pub sku: Option<String>,
}

#[async_trait::async_trait]
impl Command for UpdateProductCommand {
    type Result = product_entity::Model;

    #[instrument(skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            PRODUCT_UPDATE_FAILURES
                .with_label_values(&["validation_error"])
                .inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        if !policy::can_manage_products(&self.actor) {
            PRODUCT_UPDATE_FAILURES
                .with_label_values(&["permission_denied"])
                .inc();
            return Err(ServiceError::PermissionDenied(
                "Not allowed to update product".to_string(),
            ));
        }

        let db = db_pool.as_ref();

        let product = self.update_product_in_db(db).await?;

        self.log_and_trigger_event(&event_sender, &product).await?;

        PRODUCT_UPDATES.inc();

        Ok(product)
    }
}

impl UpdateProductCommand {
    #[instrument(skip(db))]
    async fn update_product_in_db(
        &self,
        db: &DatabaseConnection,
    ) -> Result<product_entity::Model, ServiceError> {
        let product_id = self.product_id;
        let actor = self.actor.clone();
        let name = self.name.clone();
        let sku = self.sku.clone();
        db.transaction::<_, product_entity::Model, ServiceError>(|txn| {
            Box::pin(async move {
                let product = Product::find_by_id(product_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Product {} not found", product_id))
                    })?;

                if !actor.is_superuser && actor.company_id != Some(product.company_id) {
                    return Err(ServiceError::NotFound(format!(
                        "Product {} not found",
                        product_id
                    )));
                }

                let mut active: product_entity::ActiveModel = product.into();
                if let Some(name) = &name {
                    active.name = Set(name.clone());
                }
                if let Some(sku) = &sku {
                    active.sku = Set(sku.clone());
                }
                active.updated_at = Set(Utc::now());

                active.update(txn).await.map_err(ServiceError::db_error)
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => {
                PRODUCT_UPDATE_FAILURES
                    .with_label_values(&["database_error"])
                    .inc();
                error!("Database error during product update: {}", db_err);
                ServiceError::DatabaseError(db_err)
            }
            TransactionError::Transaction(service_err) => {
                PRODUCT_UPDATE_FAILURES
                    .with_label_values(&[service_err.kind()])
                    .inc();
                error!("Product update failed: {}", service_err);
                service_err
            }
        })
    }

    async fn log_and_trigger_event(
        &self,
        event_sender: &EventSender,
        product: &product_entity::Model,
    ) -> Result<(), ServiceError> {
        info!(product_id = %product.id, "Product updated successfully");
        event_sender
            .send(Event::ProductUpdated(product.id))
            .await
            .map_err(|e| {
                PRODUCT_UPDATE_FAILURES
                    .with_label_values(&["event_error"])
                    .inc();
                let msg = format!("Failed to send product updated event: {}", e);
                error!("{}", msg);
                ServiceError::EventError(msg)
            })
    }
}
