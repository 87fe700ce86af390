//! Outbound sale events.
//!
//! Publishing never blocks a request: events are queued on an unbounded
//! channel and handled by [`run_event_logger`] on its own task.

use crate::models::Sale;
use crate::services::metrics::record_event;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SaleEvent {
    SaleCreated {
        sale_id: Uuid,
        sale_number: String,
        customer: String,
        created_at: DateTime<Utc>,
    },
    SaleUpdated {
        sale_id: Uuid,
        sale_number: String,
        customer: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    },
    SaleCancelled {
        sale_id: Uuid,
        cancelled: bool,
        updated_at: DateTime<Utc>,
    },
    SaleDeleted {
        sale_id: Uuid,
        sale_number: String,
    },
}

impl SaleEvent {
    pub fn created(sale: &Sale) -> Self {
        Self::SaleCreated {
            sale_id: sale.id,
            sale_number: sale.sale_number.clone(),
            customer: sale.customer.clone(),
            created_at: sale.created_at,
        }
    }

    pub fn updated(sale: &Sale) -> Self {
        Self::SaleUpdated {
            sale_id: sale.id,
            sale_number: sale.sale_number.clone(),
            customer: sale.customer.clone(),
            created_at: sale.created_at,
            updated_at: sale.updated_at,
        }
    }

    /// Emitted for both cancel and reactivate; `cancelled` carries the new state.
    pub fn cancellation_changed(sale: &Sale) -> Self {
        Self::SaleCancelled {
            sale_id: sale.id,
            cancelled: sale.cancelled,
            updated_at: sale.updated_at,
        }
    }

    pub fn deleted(sale: &Sale) -> Self {
        Self::SaleDeleted {
            sale_id: sale.id,
            sale_number: sale.sale_number.clone(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SaleCreated { .. } => "sale_created",
            Self::SaleUpdated { .. } => "sale_updated",
            Self::SaleCancelled { .. } => "sale_cancelled",
            Self::SaleDeleted { .. } => "sale_deleted",
        }
    }

    pub fn sale_id(&self) -> Uuid {
        match self {
            Self::SaleCreated { sale_id, .. }
            | Self::SaleUpdated { sale_id, .. }
            | Self::SaleCancelled { sale_id, .. }
            | Self::SaleDeleted { sale_id, .. } => *sale_id,
        }
    }
}

/// Fire-and-forget delivery of sale events.
pub trait SaleEventSink: Send + Sync + 'static {
    fn publish(&self, event: SaleEvent);
}

/// Queues events for a background consumer.
#[derive(Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<SaleEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SaleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SaleEventSink for ChannelEventSink {
    fn publish(&self, event: SaleEvent) {
        let event_type = event.event_type();
        let sale_id = event.sale_id();

        match self.tx.send(event) {
            Ok(()) => record_event(event_type, true),
            Err(_) => {
                record_event(event_type, false);
                tracing::warn!(
                    event = event_type,
                    sale_id = %sale_id,
                    "Event consumer gone, dropping event"
                );
            }
        }
    }
}

/// Logs every event until all senders are dropped.
pub async fn run_event_logger(mut rx: mpsc::UnboundedReceiver<SaleEvent>) {
    tracing::info!("Sale event logger started");

    while let Some(event) = rx.recv().await {
        match &event {
            SaleEvent::SaleCreated {
                sale_id,
                sale_number,
                customer,
                created_at,
            } => tracing::info!(
                sale_id = %sale_id,
                sale_number = %sale_number,
                customer = %customer,
                created_at = %created_at,
                "Sale created"
            ),
            SaleEvent::SaleUpdated {
                sale_id,
                sale_number,
                customer,
                updated_at,
                ..
            } => tracing::info!(
                sale_id = %sale_id,
                sale_number = %sale_number,
                customer = %customer,
                updated_at = %updated_at,
                "Sale updated"
            ),
            SaleEvent::SaleCancelled {
                sale_id,
                cancelled,
                updated_at,
            } => tracing::info!(
                sale_id = %sale_id,
                cancelled = cancelled,
                updated_at = %updated_at,
                "Sale cancellation changed"
            ),
            SaleEvent::SaleDeleted {
                sale_id,
                sale_number,
            } => tracing::info!(
                sale_id = %sale_id,
                sale_number = %sale_number,
                "Sale deleted"
            ),
        }
    }

    tracing::info!("Sale event channel closed, logger exiting");
}

/// Keeps published events in memory. Used by tests to assert on emissions.
#[derive(Clone, Default)]
pub struct RecordingEventSink {
    events: Arc<Mutex<Vec<SaleEvent>>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SaleEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl SaleEventSink for RecordingEventSink {
    fn publish(&self, event: SaleEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deleted_event() -> SaleEvent {
        SaleEvent::SaleDeleted {
            sale_id: Uuid::new_v4(),
            sale_number: "S-1".to_string(),
        }
    }

    #[tokio::test]
    async fn channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelEventSink::new();
        let first = deleted_event();
        let second = deleted_event();

        sink.publish(first.clone());
        sink.publish(second.clone());

        assert_eq!(rx.recv().await, Some(first));
        assert_eq!(rx.recv().await, Some(second));
    }

    #[tokio::test]
    async fn publish_after_consumer_dropped_does_not_panic() {
        let (sink, rx) = ChannelEventSink::new();
        drop(rx);
        sink.publish(deleted_event());
    }

    #[tokio::test]
    async fn logger_exits_when_senders_dropped() {
        let (sink, rx) = ChannelEventSink::new();
        sink.publish(deleted_event());
        drop(sink);

        tokio::time::timeout(std::time::Duration::from_secs(1), run_event_logger(rx))
            .await
            .expect("logger should stop once the channel closes");
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(deleted_event()).unwrap();
        assert_eq!(json["type"], "SaleDeleted");
        assert_eq!(json["sale_number"], "S-1");
    }
}
