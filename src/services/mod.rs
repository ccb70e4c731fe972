//! Service facades over the command layer.
//!
//! Each service pairs a database pool with the event sender and exposes the
//! operations callers use. Writes construct and execute commands; reads run
//! policy-scoped queries directly.

use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;

pub mod adjustments;
pub mod stock_ledger;
pub mod transfers;

pub mod companies;
pub mod products;
pub mod warehouses;

pub use adjustments::StockAdjustmentService;
pub use companies::CompanyService;
pub use products::ProductService;
pub use transfers::TransferService;
pub use warehouses::WarehouseService;

/// One handle bundling every service, cheap to clone.
#[derive(Clone)]
pub struct AppServices {
    pub companies: CompanyService,
    pub warehouses: WarehouseService,
    pub products: ProductService,
    pub transfers: TransferService,
    pub adjustments: StockAdjustmentService,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            companies: CompanyService::new(db_pool.clone(), event_sender.clone()),
            warehouses: WarehouseService::new(db_pool.clone(), event_sender.clone()),
            products: ProductService::new(db_pool.clone(), event_sender.clone()),
            transfers: TransferService::new(db_pool.clone(), event_sender.clone()),
            adjustments: StockAdjustmentService::new(db_pool, event_sender),
        }
    }
}
