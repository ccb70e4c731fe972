pub mod policy;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Typed actor roles.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Owner,
    Manager,
    Employee,
}

/// Externally authenticated actor.
///
/// How the caller authenticated is out of scope here; each operation
/// re-derives its authorization from these fields alone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    pub company_id: Option<Uuid>,
    pub assigned_warehouse_id: Option<Uuid>,
    pub is_superuser: bool,
}

impl Principal {
    /// Validated constructor enforcing the provisioning rules of the
    /// account system: employees always work out of a warehouse, managers
    /// never hold one.
    ///
    /// Raw construction stays possible since principals arrive from an
    /// external layer; operations still re-check whatever they rely on.
    pub fn new(
        user_id: Uuid,
        role: Role,
        company_id: Option<Uuid>,
        assigned_warehouse_id: Option<Uuid>,
    ) -> Result<Self, ServiceError> {
        match role {
            Role::Employee if assigned_warehouse_id.is_none() => {
                return Err(ServiceError::ValidationError(
                    "Employee must be assigned to a warehouse".to_string(),
                ));
            }
            Role::Manager if assigned_warehouse_id.is_some() => {
                return Err(ServiceError::ValidationError(
                    "Manager cannot be assigned to a warehouse".to_string(),
                ));
            }
            _ => {}
        }

        Ok(Self {
            user_id,
            role,
            company_id,
            assigned_warehouse_id,
            is_superuser: false,
        })
    }

    pub fn with_superuser(mut self) -> Self {
        self.is_superuser = true;
        self
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }

    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }

    pub fn is_employee(&self) -> bool {
        self.role == Role::Employee
    }
}
