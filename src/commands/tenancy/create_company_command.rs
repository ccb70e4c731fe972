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
use crate::models::company_entity;

lazy_static! {
    static ref COMPANIES_CREATED: IntCounter = IntCounter::new(
        "companies_created_total",
        "Total number of companies created"
    )
    .expect("metric can be created");
    static ref COMPANY_CREATION_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "company_creation_failures_total",
            "Total number of failed company creations"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Create a company owned by the acting user.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateCompanyCommand {
    pub actor: Principal,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Company name must be between 1 and 255 characters"
    ))]
    pub name: String,
}

#[async_trait::async_trait]
impl Command for CreateCompanyCommand {
    type Result = company_entity::Model;

    #[instrument(skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            COMPANY_CREATION_FAILURES
                .with_label_values(&["validation_error"])
                .inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        if !policy::can_create_company(&self.actor) {
            COMPANY_CREATION_FAILURES
                .with_label_values(&["permission_denied"])
                .inc();
            return Err(ServiceError::PermissionDenied(
                "Only owner can create company".to_string(),
            ));
        }

        let db = db_pool.as_ref();

        let company = self.create_company_in_db(db).await?;

        self.log_and_trigger_event(&event_sender, &company).await?;

        COMPANIES_CREATED.inc();

        Ok(company)
    }
}

impl CreateCompanyCommand {
    #[instrument(skip(db))]
    async fn create_company_in_db(
        &self,
        db: &DatabaseConnection,
    ) -> Result<company_entity::Model, ServiceError> {
        let now = Utc::now();
        let company = company_entity::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(self.name.clone()),
            owner_id: Set(self.actor.user_id),
            created_at: Set(now),
            updated_at: Set(now),
        };

        company.insert(db).await.map_err(|e| {
            COMPANY_CREATION_FAILURES
                .with_label_values(&["database_error"])
                .inc();
            error!("Failed to create company: {}", e);
            ServiceError::db_error(e)
        })
    }

    async fn log_and_trigger_event(
        &self,
        event_sender: &EventSender,
        company: &company_entity::Model,
    ) -> Result<(), ServiceError> {
        info!(
            company_id = %company.id,
            owner_id = %company.owner_id,
            "Company created successfully"
        );
        event_sender
            .send(Event::CompanyCreated(company.id))
            .await
            .map_err(|e| {
                COMPANY_CREATION_FAILURES
                    .with_label_values(&["event_error"])
                    .inc();
                let msg = format!("Failed to send company created event: {}", e);
                error!("{}", msg);
                ServiceError::EventError(msg)
            })
    }
}
