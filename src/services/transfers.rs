use std::sync::Arc;

use sea_orm::{ColumnTrait, EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait};
use uuid::Uuid;

use crate::auth::Principal;
use crate::commands::transfers::approve_transfer_command::{self, SettlementOutcome};
use crate::commands::transfers::{ApproveTransferCommand, ApproveTransferResult, CreateTransferCommand};
use crate::commands::Command;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::models::product_entity::{self, Entity as Product};
use crate::models::stock_transfer_entity::{self, Entity as StockTransfer, TransferSide};

/// Two-step approved stock moves between warehouses.
#[derive(Clone)]
pub struct TransferService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl TransferService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    pub async fn create_transfer(
        &self,
        actor: Principal,
        product_id: Uuid,
        from_warehouse_id: Uuid,
        to_warehouse_id: Uuid,
        quantity: i32,
    ) -> Result<stock_transfer_entity::Model, ServiceError> {
        let command = CreateTransferCommand {
            actor,
            product_id,
            from_warehouse_id,
            to_warehouse_id,
            quantity,
        };
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    pub async fn approve_out(
        &self,
        actor: Principal,
        transfer_id: Uuid,
    ) -> Result<ApproveTransferResult, ServiceError> {
        self.approve(actor, transfer_id, TransferSide::Out).await
    }

    pub async fn approve_in(
        &self,
        actor: Principal,
        transfer_id: Uuid,
    ) -> Result<ApproveTransferResult, ServiceError> {
        self.approve(actor, transfer_id, TransferSide::In).await
    }

    pub async fn approve(
        &self,
        actor: Principal,
        transfer_id: Uuid,
        side: TransferSide,
    ) -> Result<ApproveTransferResult, ServiceError> {
        let command = ApproveTransferCommand {
            actor,
            transfer_id,
            side,
        };
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Retry settlement of a fully approved transfer that is still pending,
    /// for example after an earlier attempt hit insufficient stock.
    pub async fn try_settle(&self, transfer_id: Uuid) -> Result<SettlementOutcome, ServiceError> {
        approve_transfer_command::settle_and_notify(
            self.db_pool.as_ref(),
            self.event_sender.as_ref(),
            transfer_id,
        )
        .await
    }

    /// Fetch one transfer; transfers of other companies read as not found.
    pub async fn get_transfer(
        &self,
        actor: &Principal,
        transfer_id: Uuid,
    ) -> Result<stock_transfer_entity::Model, ServiceError> {
        let transfer = StockTransfer::find_by_id(transfer_id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Stock transfer {} not found", transfer_id))
            })?;

        if actor.is_superuser {
            return Ok(transfer);
        }

        let product = Product::find_by_id(transfer.product_id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", transfer.product_id))
            })?;

        if actor.company_id != Some(product.company_id) {
            return Err(ServiceError::NotFound(format!(
                "Stock transfer {} not found",
                transfer_id
            )));
        }

        Ok(transfer)
    }

    /// Newest-first transfers visible to the actor's company.
    pub async fn list_transfers(
        &self,
        actor: &Principal,
    ) -> Result<Vec<stock_transfer_entity::Model>, ServiceError> {
        if actor.is_superuser {
            return StockTransfer::find()
                .order_by_desc(stock_transfer_entity::Column::CreatedAt)
                .all(self.db_pool.as_ref())
                .await
                .map_err(ServiceError::db_error);
        }

        let company_id = match actor.company_id {
            Some(company_id) => company_id,
            None => return Ok(Vec::new()),
        };

        StockTransfer::find()
            .join(JoinType::InnerJoin, stock_transfer_entity::Relation::Product.def())
            .filter(product_entity::Column::CompanyId.eq(company_id))
            .order_by_desc(stock_transfer_entity::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }
}
