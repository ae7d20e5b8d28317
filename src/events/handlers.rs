//! Default subscribers wired up at startup.

use super::{DomainEvent, EventBus, EventHandler, EventKind};
use crate::errors::ServiceError;
use crate::services::customers::provision_customer;
use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{debug, info};

/// Gives every new user identity a customer profile.
pub struct ProvisionCustomer {
    db: Arc<DatabaseConnection>,
}

impl ProvisionCustomer {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EventHandler for ProvisionCustomer {
    fn name(&self) -> &'static str {
        "provision_customer"
    }

    async fn handle_event(&self, event: &DomainEvent) -> Result<(), ServiceError> {
        let DomainEvent::UserCreated { user_id, .. } = event else {
            return Ok(());
        };

        if provision_customer(&*self.db, *user_id).await? {
            info!(user_id, "Customer profile provisioned");
        } else {
            debug!(user_id, "Customer profile already exists");
        }
        Ok(())
    }
}

pub struct LogOrderCreated;

#[async_trait]
impl EventHandler for LogOrderCreated {
    fn name(&self) -> &'static str {
        "log_order_created"
    }

    async fn handle_event(&self, event: &DomainEvent) -> Result<(), ServiceError> {
        if let DomainEvent::OrderCreated { order, items } = event {
            info!(
                order_id = order.id,
                customer_id = order.customer_id,
                payment_status = %order.payment_status,
                items = items.len(),
                total = %event.order_total().unwrap_or_default(),
                "Order created"
            );
        }
        Ok(())
    }
}

/// Registers the built-in subscribers on `bus`.
pub fn register_default_handlers(bus: &EventBus, db: Arc<DatabaseConnection>) {
    bus.subscribe(EventKind::UserCreated, Arc::new(ProvisionCustomer::new(db)));
    bus.subscribe(EventKind::OrderCreated, Arc::new(LogOrderCreated));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{customer, order, order_item, user};
    use crate::events::DeliveryReport;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use sea_orm::{ActiveModelTrait, ConnectOptions, Database, EntityTrait, PaginatorTrait, Set};

    async fn migrated_pool() -> Arc<DatabaseConnection> {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1).sqlx_logging(false);
        let pool = Database::connect(opt).await.unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        Arc::new(pool)
    }

    #[tokio::test]
    async fn provisioning_twice_creates_one_profile() {
        let db = migrated_pool().await;
        let created = user::ActiveModel {
            username: Set("ada".into()),
            email: Set("ada@example.com".into()),
            first_name: Set(String::new()),
            last_name: Set(String::new()),
            is_staff: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*db)
        .await
        .unwrap();

        let bus = EventBus::new();
        register_default_handlers(&bus, db.clone());
        let event = DomainEvent::UserCreated {
            user_id: created.id,
            username: created.username.clone(),
        };

        let first = bus.publish(event.clone()).await;
        let second = bus.publish(event).await;

        assert_eq!(first.delivered, 1);
        assert_eq!(second.delivered, 1);
        assert_eq!(second.failed, 0);
        assert_eq!(customer::Entity::find().count(&*db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn provisioning_for_unknown_user_is_reported_as_failure() {
        let db = migrated_pool().await;
        let bus = EventBus::new();
        register_default_handlers(&bus, db.clone());

        let report = bus
            .publish(DomainEvent::UserCreated {
                user_id: 404,
                username: "ghost".into(),
            })
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(customer::Entity::find().count(&*db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn order_created_reaches_the_logging_handler() {
        let db = migrated_pool().await;
        let bus = EventBus::new();
        register_default_handlers(&bus, db);

        let order = order::Model {
            id: 7,
            customer_id: 3,
            placed_at: Utc::now(),
            payment_status: order::PaymentStatus::Pending,
        };
        let items = vec![order_item::Model {
            id: 1,
            order_id: 7,
            product_id: 2,
            quantity: 2,
            unit_price: dec!(9.99),
        }];

        let report = bus.publish(DomainEvent::OrderCreated { order, items }).await;
        assert_eq!(report, DeliveryReport { delivered: 1, failed: 0 });

        let ignored = LogOrderCreated
            .handle_event(&DomainEvent::UserCreated {
                user_id: 1,
                username: "ada".into(),
            })
            .await;
        assert!(ignored.is_ok());
    }
}
