use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::stock_movement_entity::MovementType;
use crate::models::stock_transfer_entity::TransferSide;

/// Domain events emitted after their originating write has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    CompanyCreated(Uuid),
    WarehouseCreated(Uuid),
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    StockAdjusted {
        warehouse_id: Uuid,
        product_id: Uuid,
        movement_id: Uuid,
        movement_type: MovementType,
        old_quantity: i32,
        new_quantity: i32,
    },
    TransferCreated(Uuid),
    TransferApproved {
        transfer_id: Uuid,
        side: TransferSide,
    },
    TransferCompleted {
        transfer_id: Uuid,
        product_id: Uuid,
        from_warehouse_id: Uuid,
        to_warehouse_id: Uuid,
        quantity: i32,
    },
    /// Catch-all for ad-hoc notifications.
    Generic {
        message: String,
        timestamp: DateTime<Utc>,
        metadata: Value,
    },
}

impl Event {
    pub fn with_data(message: String) -> Self {
        Event::Generic {
            message,
            timestamp: Utc::now(),
            metadata: Value::Null,
        }
    }
}

/// Sends events into the in-process processing loop.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Send an event, reporting failure as a plain message so callers can
    /// decide whether a dropped event is fatal.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Hook for external event consumers.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: Event) -> Result<(), String>;
}

/// Drains the event channel, logging each event. Runs until every sender
/// has been dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("Event processing loop started");

    while let Some(event) = receiver.recv().await {
        match &event {
            Event::StockAdjusted {
                warehouse_id,
                product_id,
                new_quantity,
                ..
            } => {
                debug!(
                    warehouse_id = %warehouse_id,
                    product_id = %product_id,
                    new_quantity,
                    "Stock adjusted"
                );
            }
            Event::TransferApproved { transfer_id, side } => {
                debug!(transfer_id = %transfer_id, side = %side, "Transfer side approved");
            }
            Event::TransferCompleted {
                transfer_id,
                quantity,
                ..
            } => {
                info!(transfer_id = %transfer_id, quantity, "Transfer settled");
            }
            other => debug!(event = ?other, "Domain event"),
        }
    }

    info!("Event processing loop stopped");
}
