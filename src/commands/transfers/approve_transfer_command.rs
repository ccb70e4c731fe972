//! Approval and settlement of pending stock transfers.
//!
//! Approval and settlement run in separate transactions. The approval
//! transaction commits the side's flag before settlement is attempted, so a
//! transfer whose settlement fails keeps both flags and stays `PENDING`;
//! any later [`try_settle`] call can finish the job once the blocker is
//! resolved. A status check-and-set inside the settlement transaction
//! guarantees the stock moves at most once per transfer.

use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::policy::{self, ApprovalScope};
use crate::auth::{Principal, Role};
use crate::commands::Command;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::stock_movement_entity::MovementType;
use crate::models::stock_transfer_entity::{
    self, Entity as StockTransfer, TransferSide, TransferStatus,
};
use crate::models::warehouse_entity::Entity as Warehouse;
use crate::services::stock_ledger;

lazy_static! {
    static ref TRANSFER_APPROVALS: IntCounter = IntCounter::new(
        "stock_transfer_approvals_total",
        "Total number of stock transfer approvals recorded"
    )
    .expect("metric can be created");
    static ref TRANSFER_SETTLEMENTS: IntCounter = IntCounter::new(
        "stock_transfer_settlements_total",
        "Total number of stock transfers settled"
    )
    .expect("metric can be created");
    static ref TRANSFER_APPROVAL_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "stock_transfer_approval_failures_total",
            "Total number of failed stock transfer approvals"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Record one side's approval on a pending transfer, then settle it when
/// both sides are in.
///
/// Re-approving an already approved side is a no-op; approving a transfer
/// that has left `PENDING` is a conflict.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApproveTransferCommand {
    pub actor: Principal,
    pub transfer_id: Uuid,
    pub side: TransferSide,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveTransferResult {
    pub transfer: stock_transfer_entity::Model,
    /// Whether this call moved the stock.
    pub settled: bool,
}

/// What a settlement attempt did.
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub transfer: stock_transfer_entity::Model,
    pub settled: bool,
}

#[async_trait::async_trait]
impl Command for ApproveTransferCommand {
    type Result = ApproveTransferResult;

    #[instrument(skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let db = db_pool.as_ref();

        let transfer = self.approve_in_db(db).await?;

        self.log_and_trigger_approval_event(&event_sender).await?;

        TRANSFER_APPROVALS.inc();

        if !(transfer.is_pending() && transfer.is_fully_approved()) {
            return Ok(ApproveTransferResult {
                transfer,
                settled: false,
            });
        }

        let outcome = settle_and_notify(db, &event_sender, self.transfer_id).await?;

        Ok(ApproveTransferResult {
            transfer: outcome.transfer,
            settled: outcome.settled,
        })
    }
}

impl ApproveTransferCommand {
    #[instrument(skip(db))]
    async fn approve_in_db(
        &self,
        db: &DatabaseConnection,
    ) -> Result<stock_transfer_entity::Model, ServiceError> {
        let transfer_id = self.transfer_id;
        let actor = self.actor.clone();
        let approval_side = self.side;
        db.transaction::<_, stock_transfer_entity::Model, ServiceError>(|txn| {
            Box::pin(async move {
                let transfer = StockTransfer::find_by_id(transfer_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "Stock transfer {} not found",
                            transfer_id
                        ))
                    })?;

                if !transfer.is_pending() {
                    return Err(ServiceError::Conflict(format!(
                        "Stock transfer {} is already {}",
                        transfer_id, transfer.status
                    )));
                }

                match policy::transfer_approval_scope(&actor, &transfer) {
                    Some(ApprovalScope::AnySide) => {}
                    Some(ApprovalScope::Side(side)) if side == approval_side => {}
                    _ if actor.role == Role::Manager => {
                        return Err(ServiceError::PermissionDenied(
                            "Manager cannot approve transfers".to_string(),
                        ));
                    }
                    _ => {
                        return Err(ServiceError::PermissionDenied(
                            "Not allowed to approve this transfer".to_string(),
                        ));
                    }
                }

                // Re-approval is a no-op, not a conflict.
                if transfer.approved_on(approval_side) {
                    return Ok(transfer);
                }

                let mut active: stock_transfer_entity::ActiveModel = transfer.into();
                match approval_side {
                    TransferSide::Out => active.out_approved = Set(true),
                    TransferSide::In => active.in_approved = Set(true),
                }
                active.updated_at = Set(Utc::now());

                active.update(txn).await.map_err(ServiceError::db_error)
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => {
                TRANSFER_APPROVAL_FAILURES
                    .with_label_values(&["database_error"])
                    .inc();
                error!("Database error during transfer approval: {}", db_err);
                ServiceError::DatabaseError(db_err)
            }
            TransactionError::Transaction(service_err) => {
                TRANSFER_APPROVAL_FAILURES
                    .with_label_values(&[service_err.kind()])
                    .inc();
                error!("Stock transfer approval failed: {}", service_err);
                service_err
            }
        })
    }

    async fn log_and_trigger_approval_event(
        &self,
        event_sender: &EventSender,
    ) -> Result<(), ServiceError> {
        info!(
            transfer_id = %self.transfer_id,
            side = %self.side,
            "Stock transfer approved successfully"
        );
        event_sender
            .send(Event::TransferApproved {
                transfer_id: self.transfer_id,
                side: self.side,
            })
            .await
            .map_err(|e| {
                TRANSFER_APPROVAL_FAILURES
                    .with_label_values(&["event_error"])
                    .inc();
                let msg = format!("Failed to send transfer approved event: {}", e);
                error!("{}", msg);
                ServiceError::EventError(msg)
            })
    }
}

/// Settle a transfer if it is still `PENDING` with both approvals in.
///
/// Idempotent: callers may retry freely. The status flip is a conditional
/// update on `status = PENDING`, so concurrent callers race for one winner
/// and the losers report `settled: false`. The debit, credit, journal rows
/// and status flip share one transaction; if the source warehouse cannot
/// cover the quantity the whole attempt rolls back and the transfer stays
/// `PENDING` with its approvals intact.
#[instrument(skip(db))]
pub async fn try_settle(
    db: &DatabaseConnection,
    transfer_id: Uuid,
) -> Result<SettlementOutcome, ServiceError> {
    db.transaction::<_, SettlementOutcome, ServiceError>(move |txn| {
        Box::pin(async move {
            let transfer = StockTransfer::find_by_id(transfer_id)
                .one(txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Stock transfer {} not found", transfer_id))
                })?;

            if !(transfer.is_pending() && transfer.is_fully_approved()) {
                return Ok(SettlementOutcome {
                    transfer,
                    settled: false,
                });
            }

            let from_warehouse = Warehouse::find_by_id(transfer.from_warehouse_id)
                .one(txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Warehouse {} not found",
                        transfer.from_warehouse_id
                    ))
                })?;
            let to_warehouse = Warehouse::find_by_id(transfer.to_warehouse_id)
                .one(txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Warehouse {} not found",
                        transfer.to_warehouse_id
                    ))
                })?;
            stock_transfer_entity::validate_routing(&from_warehouse, &to_warehouse)?;

            let claimed = StockTransfer::update_many()
                .col_expr(
                    stock_transfer_entity::Column::Status,
                    Expr::value(TransferStatus::Completed),
                )
                .col_expr(
                    stock_transfer_entity::Column::UpdatedAt,
                    Expr::value(Utc::now()),
                )
                .filter(stock_transfer_entity::Column::Id.eq(transfer_id))
                .filter(stock_transfer_entity::Column::Status.eq(TransferStatus::Pending))
                .exec(txn)
                .await
                .map_err(ServiceError::db_error)?;

            if claimed.rows_affected == 0 {
                warn!(transfer_id = %transfer_id, "Settlement lost the status race");
                let current = StockTransfer::find_by_id(transfer_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Stock transfer {} not found", transfer_id))
                    })?;
                return Ok(SettlementOutcome {
                    transfer: current,
                    settled: false,
                });
            }

            stock_ledger::debit(
                txn,
                transfer.from_warehouse_id,
                transfer.product_id,
                transfer.quantity,
            )
            .await?;
            stock_ledger::credit(
                txn,
                transfer.to_warehouse_id,
                transfer.product_id,
                transfer.quantity,
            )
            .await?;

            stock_ledger::record_movement(
                txn,
                transfer.from_warehouse_id,
                transfer.product_id,
                MovementType::Out,
                transfer.quantity,
                Some("stock_transfer".to_string()),
                Some(transfer_id),
            )
            .await?;
            stock_ledger::record_movement(
                txn,
                transfer.to_warehouse_id,
                transfer.product_id,
                MovementType::In,
                transfer.quantity,
                Some("stock_transfer".to_string()),
                Some(transfer_id),
            )
            .await?;

            let settled = StockTransfer::find_by_id(transfer_id)
                .one(txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Stock transfer {} not found", transfer_id))
                })?;

            Ok(SettlementOutcome {
                transfer: settled,
                settled: true,
            })
        })
    })
    .await
    .map_err(|e| match e {
        TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        TransactionError::Transaction(service_err) => service_err,
    })
}

/// [`try_settle`] plus failure counters and the settlement event.
pub(crate) async fn settle_and_notify(
    db: &DatabaseConnection,
    event_sender: &EventSender,
    transfer_id: Uuid,
) -> Result<SettlementOutcome, ServiceError> {
    let outcome = try_settle(db, transfer_id).await.map_err(|e| {
        TRANSFER_APPROVAL_FAILURES
            .with_label_values(&[e.kind()])
            .inc();
        e
    })?;

    if outcome.settled {
        log_and_trigger_settlement_event(event_sender, &outcome.transfer).await?;
        TRANSFER_SETTLEMENTS.inc();
    }

    Ok(outcome)
}

async fn log_and_trigger_settlement_event(
    event_sender: &EventSender,
    transfer: &stock_transfer_entity::Model,
) -> Result<(), ServiceError> {
    info!(
        transfer_id = %transfer.id,
        product_id = %transfer.product_id,
        from_warehouse_id = %transfer.from_warehouse_id,
        to_warehouse_id = %transfer.to_warehouse_id,
        quantity = transfer.quantity,
        "Stock transfer settled successfully"
    );
    event_sender
        .send(Event::TransferCompleted {
            transfer_id: transfer.id,
            product_id: transfer.product_id,
            from_warehouse_id: transfer.from_warehouse_id,
            to_warehouse_id: transfer.to_warehouse_id,
            quantity: transfer.quantity,
        })
        .await
        .map_err(|e| {
            TRANSFER_APPROVAL_FAILURES
                .with_label_values(&["event_error"])
                .inc();
            let msg = format!("Failed to send transfer settled event: {}", e);
            error!("{}", msg);
            ServiceError::EventError(msg)
        })
}
