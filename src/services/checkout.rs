//! Cart-to-order conversion.
//!
//! Everything from resolving the cart to deleting it happens in one
//! transaction. The cart row is locked first, and the final cart delete is the
//! point where two racing checkouts of the same cart are told apart: the loser
//! deletes zero rows and rolls back. `OrderCreated` is published only after
//! commit.

use crate::{
    context::RequestContext,
    db,
    entities::{cart, cart_item, customer, order, order_item, product},
    errors::ServiceError,
    events::{DomainEvent, EventBus},
    services::orders::{OrderDetail, OrderLine},
};
use chrono::Utc;
use metrics::{counter, histogram};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub cart_id: Uuid,
}

/// Result of the transactional part of a checkout
struct PlacedOrder {
    order: order::Model,
    items: Vec<order_item::Model>,
    detail: OrderDetail,
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    events: Arc<EventBus>,
}

impl CheckoutService {
    pub fn new(db: Arc<DatabaseConnection>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// Converts the cart into an order owned by the calling user's customer
    /// profile. The cart no longer exists afterwards, so replaying the same
    /// request fails with `NotFound`.
    #[instrument(skip(self, ctx), fields(cart_id = %request.cart_id))]
    pub async fn place_order(
        &self,
        ctx: &RequestContext,
        request: CreateOrderRequest,
    ) -> Result<OrderDetail, ServiceError> {
        let user_id = ctx.caller()?.user_id;
        let cart_id = request.cart_id;
        let start = Instant::now();

        let result = db::transaction(&self.db, "checkout", move |txn| {
            Box::pin(async move { convert_cart(txn, cart_id, user_id).await })
        })
        .await;

        histogram!("storefront_checkout.duration", start.elapsed());
        let placed = match result {
            Ok(placed) => placed,
            Err(err) => {
                counter!("storefront_checkout.failed", 1, "reason" => failure_reason(&err));
                warn!(cart_id = %cart_id, user_id, error = %err, "Checkout failed");
                return Err(err);
            }
        };

        counter!("storefront_checkout.completed", 1);
        info!(
            order_id = placed.order.id,
            cart_id = %cart_id,
            items = placed.items.len(),
            total = %placed.detail.total_price,
            "Order placed"
        );

        self.events
            .publish(DomainEvent::OrderCreated {
                order: placed.order,
                items: placed.items,
            })
            .await;

        Ok(placed.detail)
    }
}

async fn convert_cart(
    txn: &DatabaseTransaction,
    cart_id: Uuid,
    user_id: i32,
) -> Result<PlacedOrder, ServiceError> {
    let cart = cart::Entity::find_by_id(cart_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

    let customer = customer::Entity::find()
        .filter(customer::Column::UserId.eq(user_id))
        .one(txn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("No customer profile for user {}", user_id))
        })?;

    let order = order::ActiveModel {
        customer_id: Set(customer.id),
        placed_at: Set(Utc::now()),
        payment_status: Set(order::PaymentStatus::Pending),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    let cart_lines = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .find_also_related(product::Entity)
        .order_by_asc(cart_item::Column::Id)
        .all(txn)
        .await?;

    let mut new_items = Vec::with_capacity(cart_lines.len());
    for (item, product) in &cart_lines {
        let product = product.as_ref().ok_or_else(|| {
            ServiceError::IntegrityViolation(format!(
                "Cart item {} references a missing product",
                item.id
            ))
        })?;
        new_items.push(order_item::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(product.id),
            quantity: Set(item.quantity),
            unit_price: Set(product.unit_price),
            ..Default::default()
        });
    }

    if !new_items.is_empty() {
        order_item::Entity::insert_many(new_items)
            .exec_without_returning(txn)
            .await?;
    }

    cart_item::Entity::delete_many()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .exec(txn)
        .await?;
    let deleted = cart::Entity::delete_by_id(cart.id).exec(txn).await?;
    if deleted.rows_affected == 0 {
        return Err(ServiceError::Conflict(format!(
            "Cart {} was checked out concurrently",
            cart_id
        )));
    }

    let rows = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .find_also_related(product::Entity)
        .order_by_asc(order_item::Column::Id)
        .all(txn)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    let mut lines = Vec::with_capacity(rows.len());
    for (item, product) in rows {
        let product = product.ok_or_else(|| {
            ServiceError::IntegrityViolation(format!(
                "Order item {} references a missing product",
                item.id
            ))
        })?;
        lines.push(OrderLine::new(&item, &product));
        items.push(item);
    }

    let detail = OrderDetail::new(&order, lines);
    Ok(PlacedOrder {
        order,
        items,
        detail,
    })
}

fn failure_reason(err: &ServiceError) -> &'static str {
    match err {
        ServiceError::NotFound(_) => "not_found",
        ServiceError::Conflict(_) => "conflict",
        ServiceError::Unauthorized(_) => "unauthorized",
        ServiceError::IntegrityViolation(_) => "integrity",
        _ => "error",
    }
}
