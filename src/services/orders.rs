use crate::{
    context::RequestContext,
    db,
    entities::{customer, order, order_item, product},
    errors::ServiceError,
    services::{catalog::ProductSummary, fetch_page, PageRequest},
    PaginatedResponse,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, JoinType,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Select, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

/// Order line with the price captured at checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderLine {
    pub id: i32,
    pub product: ProductSummary,
    pub quantity: i32,
    #[schema(value_type = String, example = "9.99")]
    pub unit_price: Decimal,
}

impl OrderLine {
    pub fn new(item: &order_item::Model, product: &product::Model) -> Self {
        Self {
            id: item.id,
            product: ProductSummary::from(product),
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }

    pub fn total_price(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderDetail {
    pub id: i32,
    pub customer_id: i32,
    pub placed_at: DateTime<Utc>,
    pub payment_status: order::PaymentStatus,
    pub items: Vec<OrderLine>,
    #[schema(value_type = String, example = "24.98")]
    pub total_price: Decimal,
}

impl OrderDetail {
    pub fn new(order: &order::Model, items: Vec<OrderLine>) -> Self {
        let total_price = items.iter().map(OrderLine::total_price).sum();
        Self {
            id: order.id,
            customer_id: order.customer_id,
            placed_at: order.placed_at,
            payment_status: order.payment_status,
            items,
            total_price,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateOrder {
    pub payment_status: order::PaymentStatus,
}

/// Loads the lines of every order in one query and assembles details in the
/// order given.
pub async fn load_order_details<C: ConnectionTrait>(
    conn: &C,
    orders: Vec<order::Model>,
) -> Result<Vec<OrderDetail>, ServiceError> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i32> = orders.iter().map(|o| o.id).collect();
    let rows = order_item::Entity::find()
        .filter(order_item::Column::OrderId.is_in(ids))
        .find_also_related(product::Entity)
        .order_by_asc(order_item::Column::Id)
        .all(conn)
        .await?;

    let mut lines: HashMap<i32, Vec<OrderLine>> = HashMap::new();
    for (item, product) in rows {
        let product = product.ok_or_else(|| {
            ServiceError::IntegrityViolation(format!(
                "Order item {} references a missing product",
                item.id
            ))
        })?;
        lines
            .entry(item.order_id)
            .or_default()
            .push(OrderLine::new(&item, &product));
    }

    Ok(orders
        .iter()
        .map(|order| OrderDetail::new(order, lines.remove(&order.id).unwrap_or_default()))
        .collect())
}

/// Order queries scoped to the caller, plus staff maintenance.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Orders visible to the caller: all of them for staff, otherwise only
    /// those of the caller's own customer profile.
    fn visible_orders(ctx: &RequestContext) -> Result<Select<order::Entity>, ServiceError> {
        let caller = ctx.caller()?;
        let query = order::Entity::find();
        if caller.is_staff {
            return Ok(query);
        }
        Ok(query
            .join(JoinType::InnerJoin, order::Relation::Customer.def())
            .filter(customer::Column::UserId.eq(caller.user_id)))
    }

    #[instrument(skip(self, ctx))]
    pub async fn list(
        &self,
        ctx: &RequestContext,
        page: PageRequest,
    ) -> Result<PaginatedResponse<OrderDetail>, ServiceError> {
        let query = Self::visible_orders(ctx)?.order_by_asc(order::Column::Id);
        let orders = fetch_page(query, &*self.db, page).await?;
        let details = load_order_details(&*self.db, orders.items.clone()).await?;
        Ok(orders.with_items(details))
    }

    #[instrument(skip(self, ctx))]
    pub async fn get(&self, ctx: &RequestContext, id: i32) -> Result<OrderDetail, ServiceError> {
        let order = Self::visible_orders(ctx)?
            .filter(order::Column::Id.eq(id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;

        let mut details = load_order_details(&*self.db, vec![order]).await?;
        details
            .pop()
            .ok_or_else(|| ServiceError::InternalError(format!("Order {} has no detail", id)))
    }

    /// Staff-only: changes the payment status, the one mutable order field.
    #[instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        id: i32,
        input: UpdateOrder,
    ) -> Result<OrderDetail, ServiceError> {
        let existing = order::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;

        let mut active: order::ActiveModel = existing.into();
        active.payment_status = Set(input.payment_status);
        let updated = active.update(&*self.db).await?;

        info!(order_id = id, payment_status = %updated.payment_status, "Order payment status updated");
        let mut details = load_order_details(&*self.db, vec![updated]).await?;
        details
            .pop()
            .ok_or_else(|| ServiceError::InternalError(format!("Order {} has no detail", id)))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        db::transaction(&self.db, "order_delete", move |txn| {
            Box::pin(async move {
                let existing = order::Entity::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;

                order_item::Entity::delete_many()
                    .filter(order_item::Column::OrderId.eq(existing.id))
                    .exec(txn)
                    .await?;
                order::Entity::delete_by_id(existing.id).exec(txn).await?;
                Ok(())
            })
        })
        .await?;

        info!(order_id = id, "Order deleted");
        Ok(())
    }
}
