//! Pure access rules.
//!
//! Every function here is side-effect free and takes the acting principal
//! plus the minimum target data needed to decide. Services and commands
//! call these before touching persistent state.

use uuid::Uuid;

use super::{Principal, Role};
use crate::models::stock_transfer_entity::{self, TransferSide};

/// Scope granted to an actor for approving a transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalScope {
    /// Owners may force either side through.
    AnySide,
    /// Employees may approve exactly the side matching their warehouse.
    Side(TransferSide),
}

/// Company visibility for listings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompanyScope {
    All,
    OwnedBy(Uuid),
    Single(Uuid),
}

/// Product visibility for listings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProductScope {
    /// Only products with a stock row in the given warehouse.
    AssignedWarehouse(Uuid),
    /// The whole company catalogue.
    Company(Uuid),
}

pub fn can_create_company(actor: &Principal) -> bool {
    actor.role == Role::Owner
}

pub fn can_create_warehouse(actor: &Principal, company_id: Uuid) -> bool {
    actor.role == Role::Owner && actor.company_id == Some(company_id)
}

/// Product creation and update share one rule.
pub fn can_manage_products(actor: &Principal) -> bool {
    matches!(actor.role, Role::Owner | Role::Manager)
}

pub fn can_create_transfer(actor: &Principal) -> bool {
    matches!(actor.role, Role::Owner | Role::Manager)
}

/// What, if anything, the actor may approve on this transfer.
///
/// Owners force either side; managers approve nothing; employees approve
/// the side whose warehouse matches their assignment.
pub fn transfer_approval_scope(
    actor: &Principal,
    transfer: &stock_transfer_entity::Model,
) -> Option<ApprovalScope> {
    match actor.role {
        Role::Owner => Some(ApprovalScope::AnySide),
        Role::Manager => None,
        Role::Employee => {
            let warehouse_id = actor.assigned_warehouse_id?;
            if warehouse_id == transfer.warehouse_on(TransferSide::Out) {
                Some(ApprovalScope::Side(TransferSide::Out))
            } else if warehouse_id == transfer.warehouse_on(TransferSide::In) {
                Some(ApprovalScope::Side(TransferSide::In))
            } else {
                None
            }
        }
    }
}

pub fn can_adjust_stock(actor: &Principal, warehouse_id: Uuid) -> bool {
    actor.role == Role::Employee && actor.assigned_warehouse_id == Some(warehouse_id)
}

/// Which companies the actor may list. `None` means none at all.
pub fn company_list_scope(actor: &Principal) -> Option<CompanyScope> {
    if actor.is_superuser {
        return Some(CompanyScope::All);
    }
    if actor.role == Role::Owner {
        return Some(CompanyScope::OwnedBy(actor.user_id));
    }
    actor.company_id.map(CompanyScope::Single)
}

/// Which products the actor may list. `None` means none at all.
pub fn product_list_scope(actor: &Principal) -> Option<ProductScope> {
    if actor.role == Role::Employee {
        return actor
            .assigned_warehouse_id
            .map(ProductScope::AssignedWarehouse);
    }
    actor.company_id.map(ProductScope::Company)
}
