//! Stock ledger primitives.
//!
//! Every quantity write is a conditional update guarded by the row's
//! `version`. A guard miss means another writer landed between our read and
//! our write, so the row is re-read and the update retried a bounded number
//! of times before giving up with `ConcurrentModification`. Callers compose
//! these inside their own transaction to make multi-row moves atomic.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::stock_level_entity::{self, Entity as StockLevel};
use crate::models::stock_movement_entity::{self, MovementType};

/// Conditional-update attempts before giving up on a contended row.
const MAX_CAS_ATTEMPTS: u32 = 3;

fn ensure_positive(amount: i32) -> Result<(), ServiceError> {
    if amount <= 0 {
        return Err(ServiceError::ValidationError(
            "Quantity must be positive".to_string(),
        ));
    }
    Ok(())
}

fn insufficient(warehouse_id: Uuid, requested: i32, available: i32) -> ServiceError {
    ServiceError::InsufficientStock(format!(
        "Not enough stock in warehouse {}: requested {}, available {}",
        warehouse_id, requested, available
    ))
}

async fn find_level<C>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
) -> Result<Option<stock_level_entity::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    StockLevel::find()
        .filter(stock_level_entity::Column::WarehouseId.eq(warehouse_id))
        .filter(stock_level_entity::Column::ProductId.eq(product_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)
}

/// Current quantity for the pair; zero when no row exists yet.
pub async fn quantity_of<C>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
) -> Result<i32, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(find_level(conn, warehouse_id, product_id)
        .await?
        .map(|level| level.quantity)
        .unwrap_or(0))
}

/// Fetch the ledger row for the pair, lazily creating it at zero.
///
/// Two writers racing on the same missing pair both try to insert; the
/// unique `(warehouse_id, product_id)` index lets one through and the loser
/// re-reads the winner's row.
#[instrument(skip(conn))]
pub async fn get_or_init<C>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
) -> Result<stock_level_entity::Model, ServiceError>
where
    C: ConnectionTrait,
{
    if let Some(level) = find_level(conn, warehouse_id, product_id).await? {
        return Ok(level);
    }

    let now = Utc::now();
    let row = stock_level_entity::ActiveModel {
        id: Set(Uuid::new_v4()),
        warehouse_id: Set(warehouse_id),
        product_id: Set(product_id),
        quantity: Set(0),
        version: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    };

    match row.insert(conn).await {
        Ok(level) => Ok(level),
        Err(insert_err) => {
            debug!(
                warehouse_id = %warehouse_id,
                product_id = %product_id,
                "Lazy ledger insert collided, re-reading"
            );
            find_level(conn, warehouse_id, product_id)
                .await?
                .ok_or(ServiceError::DatabaseError(insert_err))
        }
    }
}

/// Add `amount` to the pair's quantity, creating the row when absent.
#[instrument(skip(conn))]
pub async fn credit<C>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
    amount: i32,
) -> Result<stock_level_entity::Model, ServiceError>
where
    C: ConnectionTrait,
{
    ensure_positive(amount)?;

    let mut attempts = 0;
    loop {
        let level = get_or_init(conn, warehouse_id, product_id).await?;

        if let Some(updated) = write_quantity(conn, &level, level.quantity + amount).await? {
            return Ok(updated);
        }

        attempts += 1;
        if attempts >= MAX_CAS_ATTEMPTS {
            return Err(ServiceError::ConcurrentModification(level.id));
        }
        warn!(
            stock_level_id = %level.id,
            attempts,
            "Ledger credit lost a version race, retrying"
        );
    }
}

/// Remove `amount` from the pair's quantity.
///
/// A missing row reads as zero stock, so debiting it fails without creating
/// anything. The ledger is untouched on any failure.
#[instrument(skip(conn))]
pub async fn debit<C>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
    amount: i32,
) -> Result<stock_level_entity::Model, ServiceError>
where
    C: ConnectionTrait,
{
    ensure_positive(amount)?;

    let mut attempts = 0;
    loop {
        let level = find_level(conn, warehouse_id, product_id)
            .await?
            .ok_or_else(|| insufficient(warehouse_id, amount, 0))?;

        if !level.can_cover(amount) {
            return Err(insufficient(warehouse_id, amount, level.quantity));
        }

        if let Some(updated) = write_quantity(conn, &level, level.quantity - amount).await? {
            return Ok(updated);
        }

        attempts += 1;
        if attempts >= MAX_CAS_ATTEMPTS {
            return Err(ServiceError::ConcurrentModification(level.id));
        }
        warn!(
            stock_level_id = %level.id,
            attempts,
            "Ledger debit lost a version race, retrying"
        );
    }
}

/// Version-guarded quantity write. `None` means the guard missed and the
/// caller should re-read the row.
async fn write_quantity<C>(
    conn: &C,
    level: &stock_level_entity::Model,
    new_quantity: i32,
) -> Result<Option<stock_level_entity::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    let result = StockLevel::update_many()
        .col_expr(stock_level_entity::Column::Quantity, Expr::value(new_quantity))
        .col_expr(
            stock_level_entity::Column::Version,
            Expr::value(level.version + 1),
        )
        .col_expr(
            stock_level_entity::Column::UpdatedAt,
            Expr::value(Utc::now()),
        )
        .filter(stock_level_entity::Column::Id.eq(level.id))
        .filter(stock_level_entity::Column::Version.eq(level.version))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected == 0 {
        return Ok(None);
    }

    StockLevel::find_by_id(level.id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Stock level {} not found", level.id)))
        .map(Some)
}

/// Append a journal row describing one ledger mutation. Runs in the same
/// transaction as the mutation it describes.
pub async fn record_movement<C>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
    movement_type: MovementType,
    quantity: i32,
    reference_type: Option<String>,
    reference_id: Option<Uuid>,
) -> Result<stock_movement_entity::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let movement = stock_movement_entity::ActiveModel {
        id: Set(Uuid::new_v4()),
        warehouse_id: Set(warehouse_id),
        product_id: Set(product_id),
        movement_type: Set(movement_type),
        quantity: Set(quantity),
        reference_type: Set(reference_type),
        reference_id: Set(reference_id),
        created_at: Set(Utc::now()),
    };

    movement.insert(conn).await.map_err(ServiceError::db_error)
}
