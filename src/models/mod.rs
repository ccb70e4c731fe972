// Tenancy entities
pub mod company_entity;
pub mod product_entity;
pub mod warehouse_entity;

// Stock ledger entities
pub mod stock_level_entity;
pub mod stock_movement_entity;

// Transfer workflow entities
pub mod stock_transfer_entity;

pub use stock_movement_entity::MovementType;
pub use stock_transfer_entity::{TransferSide, TransferStatus};
