use crate::errors::ServiceError;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a stock transfer.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[strum(serialize_all = "UPPERCASE")]
pub enum TransferStatus {
    /// Awaiting approvals, or awaiting a retryable settlement.
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Stock has moved. Terminal.
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    /// Declared for future workflows; no operation currently produces it.
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

/// The two halves of a transfer, each carrying its own approval flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransferSide {
    /// Source warehouse half.
    Out,
    /// Destination warehouse half.
    In,
}

/// A dual-approval movement of one product between two warehouses of the
/// same company. Stock moves only at settlement, never at creation or
/// approval.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_transfers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,

    #[sea_orm(column_type = "Uuid")]
    pub product_id: Uuid,

    #[sea_orm(column_type = "Uuid")]
    pub from_warehouse_id: Uuid,

    #[sea_orm(column_type = "Uuid")]
    pub to_warehouse_id: Uuid,

    pub quantity: i32,

    #[sea_orm(column_type = "Uuid")]
    pub created_by: Uuid,

    pub out_approved: bool,

    pub in_approved: bool,

    pub status: TransferStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::models::product_entity::Entity",
        from = "Column::ProductId",
        to = "crate::models::product_entity::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "crate::models::warehouse_entity::Entity",
        from = "Column::FromWarehouseId",
        to = "crate::models::warehouse_entity::Column::Id"
    )]
    FromWarehouse,
    #[sea_orm(
        belongs_to = "crate::models::warehouse_entity::Entity",
        from = "Column::ToWarehouseId",
        to = "crate::models::warehouse_entity::Column::Id"
    )]
    ToWarehouse,
}

// No Related<warehouse_entity::Entity>: a transfer touches two warehouses,
// so joins pick Relation::FromWarehouse or Relation::ToWarehouse explicitly.
impl Related<crate::models::product_entity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Both sides have signed off.
    pub fn is_fully_approved(&self) -> bool {
        self.out_approved && self.in_approved
    }

    /// Still eligible for approval and settlement.
    pub fn is_pending(&self) -> bool {
        self.status == TransferStatus::Pending
    }

    /// Warehouse acting on the given side.
    pub fn warehouse_on(&self, side: TransferSide) -> Uuid {
        match side {
            TransferSide::Out => self.from_warehouse_id,
            TransferSide::In => self.to_warehouse_id,
        }
    }

    /// Approval flag of the given side.
    pub fn approved_on(&self, side: TransferSide) -> bool {
        match side {
            TransferSide::Out => self.out_approved,
            TransferSide::In => self.in_approved,
        }
    }
}

/// Routing rules re-checked on every persistence path: a transfer never
/// loops back to its source and never crosses companies.
pub fn validate_routing(
    from_warehouse: &crate::models::warehouse_entity::Model,
    to_warehouse: &crate::models::warehouse_entity::Model,
) -> Result<(), ServiceError> {
    if from_warehouse.id == to_warehouse.id {
        return Err(ServiceError::ValidationError(
            "Source and destination cannot be the same".to_string(),
        ));
    }

    if from_warehouse.company_id != to_warehouse.company_id {
        return Err(ServiceError::ValidationError(
            "Warehouses must belong to the same company".to_string(),
        ));
    }

    Ok(())
}
