use std::sync::Arc;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::auth::policy::{self, CompanyScope};
use crate::auth::Principal;
use crate::commands::tenancy::CreateCompanyCommand;
use crate::commands::Command;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::models::company_entity::{self, Entity as Company};

/// Company provisioning and listing.
#[derive(Clone)]
pub struct CompanyService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CompanyService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    pub async fn create_company(
        &self,
        actor: Principal,
        name: String,
    ) -> Result<company_entity::Model, ServiceError> {
        let command = CreateCompanyCommand { actor, name };
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Companies the actor may see, ordered by name.
    pub async fn list_companies(
        &self,
        actor: &Principal,
    ) -> Result<Vec<company_entity::Model>, ServiceError> {
        let scope = match policy::company_list_scope(actor) {
            Some(scope) => scope,
            None => return Ok(Vec::new()),
        };

        let query = match scope {
            CompanyScope::All => Company::find(),
            CompanyScope::OwnedBy(owner_id) => {
                Company::find().filter(company_entity::Column::OwnerId.eq(owner_id))
            }
            CompanyScope::Single(company_id) => {
                Company::find().filter(company_entity::Column::Id.eq(company_id))
            }
        };

        query
            .order_by_asc(company_entity::Column::Name)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }
}
