use std::sync::Arc;

use sea_orm::{ColumnTrait, EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait};
use uuid::Uuid;

use crate::auth::policy::{self, ProductScope};
use crate::auth::Principal;
use crate::commands::tenancy::{CreateProductCommand, UpdateProductCommand};
use crate::commands::Command;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::models::product_entity::{self, Entity as Product};
use crate::models::stock_level_entity;

/// Product catalogue management and listing.
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    pub async fn create_product(
        &self,
        actor: Principal,
        name: String,
        sku: String,
    ) -> Result<product_entity::Model, ServiceError> {
        let command = CreateProductCommand { actor, name, sku };
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    pub async fn update_product(
        &self,
        actor: Principal,
        product_id: Uuid,
        name: Option<String>,
        sku: Option<String>,
    ) -> Result<product_entity::Model, ServiceError> {
        let command = UpdateProductCommand {
            actor,
            product_id,
            name,
            sku,
        };
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Products the actor may see, ordered by name.
    ///
    /// Employees see only products with a stock row in their assigned
    /// warehouse, zero-quantity rows included. Everyone else sees the whole
    /// company catalogue.
    pub async fn list_products(
        &self,
        actor: &Principal,
    ) -> Result<Vec<product_entity::Model>, ServiceError> {
        let scope = match policy::product_list_scope(actor) {
            Some(scope) => scope,
            None => return Ok(Vec::new()),
        };

        let query = match scope {
            ProductScope::AssignedWarehouse(warehouse_id) => Product::find()
                .join(JoinType::InnerJoin, product_entity::Relation::StockLevels.def())
                .filter(stock_level_entity::Column::WarehouseId.eq(warehouse_id)),
            ProductScope::Company(company_id) => {
                Product::find().filter(product_entity::Column::CompanyId.eq(company_id))
            }
        };

        query
            .order_by_asc(product_entity::Column::Name)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }
}
