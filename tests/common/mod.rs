//! Shared fixtures for the integration suite.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use stockflow::auth::{Principal, Role};
use stockflow::config::AppConfig;
use stockflow::db::{establish_connection_from_app_config, run_migrations, DbPool};
use stockflow::events::{process_events, EventSender};
use stockflow::models::stock_transfer_entity::{self, TransferStatus};
use stockflow::models::{company_entity, product_entity, stock_level_entity, warehouse_entity};
use stockflow::services::AppServices;

/// A fully wired application instance backed by a throwaway SQLite file.
pub struct TestApp {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    pub event_sender: Arc<EventSender>,
    _event_task: JoinHandle<()>,
    _db_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("temp dir can be created");
        let db_path = db_dir.path().join("stockflow-test.sqlite");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        // A single connection serializes transactions, which keeps the
        // exact-count assertions in the concurrency tests deterministic on
        // SQLite.
        let config = AppConfig::new(url, "test", "info", false, false, 1);

        let db = establish_connection_from_app_config(&config)
            .await
            .expect("test database connects");
        run_migrations(&db).await.expect("migrations apply");
        let db = Arc::new(db);

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        let event_sender = Arc::new(EventSender::new(tx));
        let event_task = tokio::spawn(process_events(rx));

        let services = AppServices::new(db.clone(), event_sender.clone());

        Self {
            db,
            services,
            event_sender,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub fn owner_of(company_id: Uuid) -> Principal {
    Principal {
        user_id: Uuid::new_v4(),
        role: Role::Owner,
        company_id: Some(company_id),
        assigned_warehouse_id: None,
        is_superuser: false,
    }
}

pub fn manager_of(company_id: Uuid) -> Principal {
    Principal {
        user_id: Uuid::new_v4(),
        role: Role::Manager,
        company_id: Some(company_id),
        assigned_warehouse_id: None,
        is_superuser: false,
    }
}

pub fn employee_at(company_id: Uuid, warehouse_id: Uuid) -> Principal {
    Principal {
        user_id: Uuid::new_v4(),
        role: Role::Employee,
        company_id: Some(company_id),
        assigned_warehouse_id: Some(warehouse_id),
        is_superuser: false,
    }
}

pub async fn create_test_company(
    db: &DbPool,
    name: &str,
    owner_id: Uuid,
) -> company_entity::Model {
    let now = Utc::now();
    company_entity::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        owner_id: Set(owner_id),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("company inserts")
}

pub async fn create_test_warehouse(
    db: &DbPool,
    company_id: Uuid,
    name: &str,
    location: &str,
) -> warehouse_entity::Model {
    let now = Utc::now();
    warehouse_entity::ActiveModel {
        id: Set(Uuid::new_v4()),
        company_id: Set(company_id),
        name: Set(name.to_string()),
        location: Set(location.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("warehouse inserts")
}

pub async fn create_test_product(
    db: &DbPool,
    company_id: Uuid,
    name: &str,
    sku: &str,
) -> product_entity::Model {
    let now = Utc::now();
    product_entity::ActiveModel {
        id: Set(Uuid::new_v4()),
        company_id: Set(company_id),
        name: Set(name.to_string()),
        sku: Set(sku.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("product inserts")
}

/// Force the ledger row for the pair to an exact quantity, creating it when
/// missing.
pub async fn set_stock(db: &DbPool, warehouse_id: Uuid, product_id: Uuid, quantity: i32) {
    let existing = stock_level_entity::Entity::find()
        .filter(stock_level_entity::Column::WarehouseId.eq(warehouse_id))
        .filter(stock_level_entity::Column::ProductId.eq(product_id))
        .one(db)
        .await
        .expect("stock level query succeeds");

    let now = Utc::now();
    match existing {
        Some(level) => {
            let version = level.version;
            let mut active: stock_level_entity::ActiveModel = level.into();
            active.quantity = Set(quantity);
            active.version = Set(version + 1);
            active.updated_at = Set(now);
            active.update(db).await.expect("stock level updates");
        }
        None => {
            stock_level_entity::ActiveModel {
                id: Set(Uuid::new_v4()),
                warehouse_id: Set(warehouse_id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                version: Set(0),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(db)
            .await
            .expect("stock level inserts");
        }
    }
}

/// Quantity on hand for the pair; zero when no ledger row exists.
pub async fn stock_of(db: &DbPool, warehouse_id: Uuid, product_id: Uuid) -> i32 {
    stock_level_entity::Entity::find()
        .filter(stock_level_entity::Column::WarehouseId.eq(warehouse_id))
        .filter(stock_level_entity::Column::ProductId.eq(product_id))
        .one(db)
        .await
        .expect("stock level query succeeds")
        .map(|level| level.quantity)
        .unwrap_or(0)
}

/// Insert a pending transfer with both approvals already set, bypassing the
/// approval workflow. Used to race settlement on its own.
pub async fn create_approved_transfer(
    db: &DbPool,
    product_id: Uuid,
    from_warehouse_id: Uuid,
    to_warehouse_id: Uuid,
    quantity: i32,
) -> stock_transfer_entity::Model {
    let now = Utc::now();
    stock_transfer_entity::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        from_warehouse_id: Set(from_warehouse_id),
        to_warehouse_id: Set(to_warehouse_id),
        quantity: Set(quantity),
        created_by: Set(Uuid::new_v4()),
        out_approved: Set(true),
        in_approved: Set(true),
        status: Set(TransferStatus::Pending),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("transfer inserts")
}
