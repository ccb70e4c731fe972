use std::sync::Arc;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::auth::Principal;
use crate::commands::tenancy::CreateWarehouseCommand;
use crate::commands::Command;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::models::warehouse_entity::{self, Entity as Warehouse};

/// Warehouse provisioning and listing.
#[derive(Clone)]
pub struct WarehouseService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl WarehouseService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    pub async fn create_warehouse(
        &self,
        actor: Principal,
        name: String,
        location: String,
    ) -> Result<warehouse_entity::Model, ServiceError> {
        let command = CreateWarehouseCommand {
            actor,
            name,
            location,
        };
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Warehouses of the actor's company, ordered by name.
    pub async fn list_warehouses(
        &self,
        actor: &Principal,
    ) -> Result<Vec<warehouse_entity::Model>, ServiceError> {
        if actor.is_superuser {
            return Warehouse::find()
                .order_by_asc(warehouse_entity::Column::Name)
                .all(self.db_pool.as_ref())
                .await
                .map_err(ServiceError::db_error);
        }

        let company_id = match actor.company_id {
            Some(company_id) => company_id,
            None => return Ok(Vec::new()),
        };

        Warehouse::find()
            .filter(warehouse_entity::Column::CompanyId.eq(company_id))
            .order_by_asc(warehouse_entity::Column::Name)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }
}
