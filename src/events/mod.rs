use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event and only logs a failure; events never fail a request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

/// Domain events emitted by the services once their changes are committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    UserCreated(Uuid),
    UserLoggedIn(Uuid),
    CustomerCreated(Uuid),
    CustomerDeleted(Uuid),
    QuoteCreated {
        quote_id: Uuid,
        number: i64,
    },
    QuoteStageChanged {
        quote_id: Uuid,
        from: String,
        to: String,
    },
    ProjectCreated {
        project_id: Uuid,
        order_number: i64,
    },
    ProjectStageChanged {
        project_id: Uuid,
        from: String,
        to: String,
    },
    TaskCompleted(Uuid),
    StockMoved {
        movement_id: Uuid,
        item_id: Uuid,
        warehouse_id: Uuid,
        kind: String,
        quantity: Decimal,
    },
    LowStock {
        item_id: Uuid,
        on_hand: Decimal,
        min_stock: Decimal,
    },
    BomActivated {
        bom_id: Uuid,
        item_id: Uuid,
    },
    ProductionCompleted {
        batch_id: Uuid,
        item_id: Uuid,
        quantity: Decimal,
    },
}

/// Drains the event channel, logging every event.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::LowStock {
                item_id,
                on_hand,
                min_stock,
            } => warn!(
                item_id = %item_id,
                on_hand = %on_hand,
                min_stock = %min_stock,
                "Item below minimum stock"
            ),
            Event::ProductionCompleted {
                batch_id,
                item_id,
                quantity,
            } => info!(
                batch_id = %batch_id,
                item_id = %item_id,
                quantity = %quantity,
                "Production batch completed"
            ),
            other => info!("Received event: {:?}", other),
        }
    }

    info!("Event channel closed, stopping event processing loop");
}
