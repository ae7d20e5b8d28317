use crate::{
    db,
    entities::{cart, cart_item, product},
    errors::ServiceError,
    services::catalog::ProductSummary,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Upper bound for the quantity of a single cart line, repeated adds included.
pub const MAX_LINE_QUANTITY: i32 = 1000;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddCartItem {
    pub product_id: i32,
    #[validate(range(min = 1, max = 1000, message = "Quantity must be between 1 and 1000"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateCartItem {
    #[validate(range(min = 1, max = 1000, message = "Quantity must be between 1 and 1000"))]
    pub quantity: i32,
}

/// Cart line priced at the product's current list price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CartLine {
    pub id: i32,
    pub product: ProductSummary,
    pub quantity: i32,
    #[schema(value_type = String, example = "19.98")]
    pub total_price: Decimal,
}

impl CartLine {
    fn new(item: &cart_item::Model, product: &product::Model) -> Self {
        Self {
            id: item.id,
            product: ProductSummary::from(product),
            quantity: item.quantity,
            total_price: product.unit_price * Decimal::from(item.quantity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CartDetail {
    pub id: Uuid,
    pub items: Vec<CartLine>,
    #[schema(value_type = String, example = "24.98")]
    pub total_price: Decimal,
}

impl CartDetail {
    fn new(cart: &cart::Model, items: Vec<CartLine>) -> Self {
        let total_price = items.iter().map(|line| line.total_price).sum();
        Self {
            id: cart.id,
            items,
            total_price,
        }
    }
}

/// Anonymous carts and their lines.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn create_cart(&self) -> Result<CartDetail, ServiceError> {
        let created = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        info!(cart_id = %created.id, "Cart created");
        Ok(CartDetail::new(&created, Vec::new()))
    }

    #[instrument(skip(self))]
    pub async fn get_cart(&self, cart_id: Uuid) -> Result<CartDetail, ServiceError> {
        let cart = find_cart(&*self.db, cart_id).await?;
        let lines = load_lines(&*self.db, cart_id).await?;
        Ok(CartDetail::new(&cart, lines))
    }

    #[instrument(skip(self))]
    pub async fn delete_cart(&self, cart_id: Uuid) -> Result<(), ServiceError> {
        let cart = find_cart(&*self.db, cart_id).await?;
        cart::Entity::delete_by_id(cart.id).exec(&*self.db).await?;
        info!(cart_id = %cart_id, "Cart deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_items(&self, cart_id: Uuid) -> Result<Vec<CartLine>, ServiceError> {
        find_cart(&*self.db, cart_id).await?;
        load_lines(&*self.db, cart_id).await
    }

    #[instrument(skip(self))]
    pub async fn get_item(&self, cart_id: Uuid, item_id: i32) -> Result<CartLine, ServiceError> {
        find_cart(&*self.db, cart_id).await?;
        load_line(&*self.db, cart_id, item_id).await
    }

    /// Adds a product to the cart. Adding a product that is already in the
    /// cart increments the existing line's quantity in a single statement.
    #[instrument(skip(self))]
    pub async fn add_item(&self, cart_id: Uuid, input: AddCartItem) -> Result<CartLine, ServiceError> {
        input.validate()?;

        db::transaction(&self.db, "cart_add_item", move |txn| {
            Box::pin(async move {
                find_cart(txn, cart_id).await?;
                let product = product::Entity::find_by_id(input.product_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::invalid_field(
                            "product_id",
                            "No product with the given id was found",
                        )
                    })?;

                let existing = cart_item::Entity::find()
                    .filter(cart_item::Column::CartId.eq(cart_id))
                    .filter(cart_item::Column::ProductId.eq(product.id))
                    .one(txn)
                    .await?
                    .map_or(0, |item| item.quantity);
                if existing + input.quantity > MAX_LINE_QUANTITY {
                    return Err(ServiceError::invalid_field(
                        "quantity",
                        format!("A cart line holds at most {MAX_LINE_QUANTITY} units"),
                    ));
                }

                let line = cart_item::ActiveModel {
                    cart_id: Set(cart_id),
                    product_id: Set(product.id),
                    quantity: Set(input.quantity),
                    ..Default::default()
                };
                cart_item::Entity::insert(line)
                    .on_conflict(
                        OnConflict::columns([cart_item::Column::CartId, cart_item::Column::ProductId])
                            .value(
                                cart_item::Column::Quantity,
                                Expr::col((cart_item::Entity, cart_item::Column::Quantity))
                                    .add(Expr::cust("excluded.quantity")),
                            )
                            .to_owned(),
                    )
                    .exec_without_returning(txn)
                    .await?;

                let item = cart_item::Entity::find()
                    .filter(cart_item::Column::CartId.eq(cart_id))
                    .filter(cart_item::Column::ProductId.eq(product.id))
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::InternalError("Cart item vanished after upsert".to_string())
                    })?;

                info!(cart_id = %cart_id, product_id = product.id, quantity = item.quantity, "Cart item added");
                Ok(CartLine::new(&item, &product))
            })
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        cart_id: Uuid,
        item_id: i32,
        input: UpdateCartItem,
    ) -> Result<CartLine, ServiceError> {
        input.validate()?;
        find_cart(&*self.db, cart_id).await?;

        let (item, product) = find_line(&*self.db, cart_id, item_id).await?;
        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(input.quantity);
        let updated = active.update(&*self.db).await?;

        Ok(CartLine::new(&updated, &product))
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, cart_id: Uuid, item_id: i32) -> Result<(), ServiceError> {
        find_cart(&*self.db, cart_id).await?;
        let (item, _) = find_line(&*self.db, cart_id, item_id).await?;
        cart_item::Entity::delete_by_id(item.id)
            .exec(&*self.db)
            .await?;
        Ok(())
    }
}

async fn find_cart<C: ConnectionTrait>(conn: &C, cart_id: Uuid) -> Result<cart::Model, ServiceError> {
    cart::Entity::find_by_id(cart_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))
}

async fn find_line<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
    item_id: i32,
) -> Result<(cart_item::Model, product::Model), ServiceError> {
    let (item, product) = cart_item::Entity::find_by_id(item_id)
        .filter(cart_item::Column::CartId.eq(cart_id))
        .find_also_related(product::Entity)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;
    let product = product.ok_or_else(|| {
        ServiceError::IntegrityViolation(format!("Cart item {} references a missing product", item_id))
    })?;
    Ok((item, product))
}

async fn load_line<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
    item_id: i32,
) -> Result<CartLine, ServiceError> {
    let (item, product) = find_line(conn, cart_id, item_id).await?;
    Ok(CartLine::new(&item, &product))
}

async fn load_lines<C: ConnectionTrait>(conn: &C, cart_id: Uuid) -> Result<Vec<CartLine>, ServiceError> {
    cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .find_also_related(product::Entity)
        .order_by_asc(cart_item::Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(|(item, product)| {
            product
                .map(|product| CartLine::new(&item, &product))
                .ok_or_else(|| {
                    ServiceError::IntegrityViolation(format!(
                        "Cart item {} references a missing product",
                        item.id
                    ))
                })
        })
        .collect()
}
