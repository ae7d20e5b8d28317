//! In-process domain event bus.
//!
//! The bus is built once at startup and shared by `Arc`. Publishing fans an
//! event out to every handler subscribed to its [`EventKind`]; a handler that
//! fails or panics is logged and counted, and delivery to the remaining
//! handlers continues. Nothing is persisted or retried.

use crate::entities::{order, order_item};
use crate::errors::ServiceError;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::{future::join_all, FutureExt};
use metrics::counter;
use rust_decimal::Decimal;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use strum::Display;
use tracing::{debug, error};

pub mod handlers;

/// Named channel an event is published on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    UserCreated,
    OrderCreated,
}

#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// A user identity was created
    UserCreated { user_id: i32, username: String },
    /// Checkout committed a new order
    OrderCreated {
        order: order::Model,
        items: Vec<order_item::Model>,
    },
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::UserCreated { .. } => EventKind::UserCreated,
            DomainEvent::OrderCreated { .. } => EventKind::OrderCreated,
        }
    }

    /// Sum of quantity × snapshot price for an order event
    pub fn order_total(&self) -> Option<Decimal> {
        match self {
            DomainEvent::OrderCreated { items, .. } => Some(
                items
                    .iter()
                    .map(|item| item.unit_price * Decimal::from(item.quantity))
                    .sum(),
            ),
            _ => None,
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Short identifier used in logs and metrics
    fn name(&self) -> &'static str;

    async fn handle_event(&self, event: &DomainEvent) -> Result<(), ServiceError>;
}

/// Outcome of a single publish call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: DashMap<EventKind, Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        debug!(event = %kind, handler = handler.name(), "Registering event handler");
        self.subscribers.entry(kind).or_default().push(handler);
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .get(&kind)
            .map(|handlers| handlers.len())
            .unwrap_or(0)
    }

    /// Delivers `event` to every handler subscribed to its kind.
    ///
    /// Never fails: handler errors and panics are logged and reflected in the
    /// returned report only.
    pub async fn publish(&self, event: DomainEvent) -> DeliveryReport {
        let kind = event.kind();
        let handlers = self
            .subscribers
            .get(&kind)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        let event = &event;
        let outcomes = join_all(handlers.iter().map(|handler| async move {
            let outcome = AssertUnwindSafe(handler.handle_event(event))
                .catch_unwind()
                .await;
            (handler.name(), outcome)
        }))
        .await;

        let mut report = DeliveryReport::default();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    report.failed += 1;
                    counter!("storefront_events.handler_failed", 1, "event" => kind.to_string());
                    error!(event = %kind, handler = name, error = %err, "Event handler failed");
                }
                Err(panic) => {
                    report.failed += 1;
                    counter!("storefront_events.handler_failed", 1, "event" => kind.to_string());
                    error!(
                        event = %kind,
                        handler = name,
                        panic = panic_message(panic.as_ref()),
                        "Event handler panicked"
                    );
                }
            }
        }

        debug!(event = %kind, delivered = report.delivered, failed = report.failed, "Event published");
        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl EventHandler for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn handle_event(&self, _event: &DomainEvent) -> Result<(), ServiceError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventHandler for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn handle_event(&self, _event: &DomainEvent) -> Result<(), ServiceError> {
            Err(ServiceError::InternalError("boom".into()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl EventHandler for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn handle_event(&self, _event: &DomainEvent) -> Result<(), ServiceError> {
            panic!("subscriber bug");
        }
    }

    fn user_created() -> DomainEvent {
        DomainEvent::UserCreated {
            user_id: 1,
            username: "ada".into(),
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(user_created()).await, DeliveryReport::default());
    }

    #[tokio::test]
    async fn failing_and_panicking_handlers_do_not_block_siblings() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventKind::UserCreated, Arc::new(Failing));
        bus.subscribe(EventKind::UserCreated, Arc::new(Counting(hits.clone())));
        bus.subscribe(EventKind::UserCreated, Arc::new(Panicking));
        bus.subscribe(EventKind::UserCreated, Arc::new(Counting(hits.clone())));

        let report = bus.publish(user_created()).await;

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(
            report,
            DeliveryReport {
                delivered: 2,
                failed: 2
            }
        );
    }

    #[tokio::test]
    async fn events_only_reach_their_own_channel() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventKind::OrderCreated, Arc::new(Counting(hits.clone())));

        bus.publish(user_created()).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscriber_count(EventKind::OrderCreated), 1);
        assert_eq!(bus.subscriber_count(EventKind::UserCreated), 0);
    }

    #[test]
    fn order_total_sums_snapshot_prices() {
        let line = |id, quantity, unit_price| order_item::Model {
            id,
            order_id: 1,
            product_id: id,
            quantity,
            unit_price,
        };
        let event = DomainEvent::OrderCreated {
            order: order::Model {
                id: 1,
                customer_id: 1,
                placed_at: Utc::now(),
                payment_status: order::PaymentStatus::Pending,
            },
            items: vec![line(1, 2, dec!(9.99)), line(2, 1, dec!(5.00))],
        };
        assert_eq!(event.order_total(), Some(dec!(24.98)));
        assert_eq!(user_created().order_total(), None);
    }
}
