use crate::{
    entities::{collection, order_item, product},
    errors::ServiceError,
    services::{fetch_page, PageRequest},
    PaginatedResponse,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult,
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Select, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::EnumString;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Collection row annotated with the number of products in it
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize, ToSchema)]
pub struct CollectionWithCount {
    pub id: i32,
    pub title: String,
    pub products_count: i64,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CollectionInput {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ProductInput {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 255), custom = "validate_slug")]
    pub slug: String,
    pub description: Option<String>,
    #[validate(custom = "validate_unit_price")]
    #[schema(value_type = String, example = "9.99")]
    pub unit_price: Decimal,
    #[validate(range(min = 0, message = "Inventory cannot be negative"))]
    pub inventory: i32,
    pub collection_id: i32,
}

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        Ok(())
    } else {
        let mut err = ValidationError::new("slug");
        err.message = Some("Slug may only contain lowercase letters, digits and hyphens".into());
        Err(err)
    }
}

fn validate_unit_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        let mut err = ValidationError::new("unit_price");
        err.message = Some("Unit price cannot be negative".into());
        return Err(err);
    }
    if price.scale() > 2 {
        let mut err = ValidationError::new("unit_price");
        err.message = Some("Unit price allows at most two decimal places".into());
        return Err(err);
    }
    Ok(())
}

/// Compact product view embedded in cart and order lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ProductSummary {
    pub id: i32,
    pub title: String,
    #[schema(value_type = String, example = "9.99")]
    pub unit_price: Decimal,
}

impl From<&product::Model> for ProductSummary {
    fn from(product: &product::Model) -> Self {
        Self {
            id: product.id,
            title: product.title.clone(),
            unit_price: product.unit_price,
        }
    }
}

/// Supported `ordering` values for product listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
pub enum ProductOrdering {
    #[strum(serialize = "unit_price")]
    UnitPriceAsc,
    #[strum(serialize = "-unit_price")]
    UnitPriceDesc,
    #[strum(serialize = "title")]
    TitleAsc,
    #[strum(serialize = "-title")]
    TitleDesc,
    #[strum(serialize = "last_update")]
    LastUpdateAsc,
    #[strum(serialize = "-last_update")]
    LastUpdateDesc,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub collection_id: Option<i32>,
    pub unit_price_gt: Option<Decimal>,
    pub unit_price_lt: Option<Decimal>,
    pub search: Option<String>,
    pub ordering: Option<ProductOrdering>,
}

impl ProductFilter {
    fn apply(&self, mut query: Select<product::Entity>) -> Select<product::Entity> {
        if let Some(collection_id) = self.collection_id {
            query = query.filter(product::Column::CollectionId.eq(collection_id));
        }
        if let Some(min) = self.unit_price_gt {
            query = query.filter(product::Column::UnitPrice.gt(min));
        }
        if let Some(max) = self.unit_price_lt {
            query = query.filter(product::Column::UnitPrice.lt(max));
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", term.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(Expr::expr(Func::lower(Expr::col(product::Column::Title))).like(&pattern))
                    .add(
                        Expr::expr(Func::lower(Expr::col(product::Column::Description)))
                            .like(&pattern),
                    ),
            );
        }
        let query = match self.ordering {
            Some(ProductOrdering::UnitPriceAsc) => query.order_by_asc(product::Column::UnitPrice),
            Some(ProductOrdering::UnitPriceDesc) => query.order_by_desc(product::Column::UnitPrice),
            Some(ProductOrdering::TitleAsc) => query.order_by_asc(product::Column::Title),
            Some(ProductOrdering::TitleDesc) => query.order_by_desc(product::Column::Title),
            Some(ProductOrdering::LastUpdateAsc) => query.order_by_asc(product::Column::LastUpdate),
            Some(ProductOrdering::LastUpdateDesc) => {
                query.order_by_desc(product::Column::LastUpdate)
            }
            None => query,
        };
        query.order_by_asc(product::Column::Id)
    }
}

/// Collections and products, with their deletion guards.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    tax_rate: Decimal,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, tax_rate: Decimal) -> Self {
        Self { db, tax_rate }
    }

    /// Display price including tax, rounded to cents
    pub fn price_with_tax(&self, unit_price: Decimal) -> Decimal {
        (unit_price * (Decimal::ONE + self.tax_rate)).round_dp(2)
    }

    fn collections_with_counts() -> Select<collection::Entity> {
        collection::Entity::find()
            .select_only()
            .column(collection::Column::Id)
            .column(collection::Column::Title)
            .column_as(
                Expr::col((product::Entity, product::Column::Id)).count(),
                "products_count",
            )
            .join(JoinType::LeftJoin, collection::Relation::Products.def())
            .group_by(collection::Column::Id)
            .group_by(collection::Column::Title)
    }

    #[instrument(skip(self))]
    pub async fn list_collections(
        &self,
        page: PageRequest,
    ) -> Result<PaginatedResponse<CollectionWithCount>, ServiceError> {
        let query = Self::collections_with_counts()
            .order_by_asc(collection::Column::Id)
            .into_model::<CollectionWithCount>();
        Ok(fetch_page(query, &*self.db, page).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_collection(&self, id: i32) -> Result<CollectionWithCount, ServiceError> {
        Self::collections_with_counts()
            .filter(collection::Column::Id.eq(id))
            .into_model::<CollectionWithCount>()
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Collection {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn create_collection(
        &self,
        input: CollectionInput,
    ) -> Result<CollectionWithCount, ServiceError> {
        input.validate()?;
        let created = collection::ActiveModel {
            title: Set(input.title),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(collection_id = created.id, "Collection created");
        Ok(CollectionWithCount {
            id: created.id,
            title: created.title,
            products_count: 0,
        })
    }

    #[instrument(skip(self))]
    pub async fn update_collection(
        &self,
        id: i32,
        input: CollectionInput,
    ) -> Result<CollectionWithCount, ServiceError> {
        input.validate()?;
        let existing = collection::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Collection {} not found", id)))?;

        let mut active: collection::ActiveModel = existing.into();
        active.title = Set(input.title);
        active.update(&*self.db).await?;

        self.get_collection(id).await
    }

    /// Deletes a collection that no product belongs to.
    #[instrument(skip(self))]
    pub async fn delete_collection(&self, id: i32) -> Result<(), ServiceError> {
        let existing = collection::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Collection {} not found", id)))?;

        let products = product::Entity::find()
            .filter(product::Column::CollectionId.eq(id))
            .count(&*self.db)
            .await?;
        if products > 0 {
            return Err(ServiceError::MethodNotAllowed(
                "Collection cannot be deleted because it includes one or more products".to_string(),
            ));
        }

        collection::Entity::delete_by_id(existing.id)
            .exec(&*self.db)
            .await?;
        info!(collection_id = id, "Collection deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<product::Model>, ServiceError> {
        let query = filter.apply(product::Entity::find());
        Ok(fetch_page(query, &*self.db, page).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: i32) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    async fn ensure_collection_exists(&self, collection_id: i32) -> Result<(), ServiceError> {
        let found = collection::Entity::find_by_id(collection_id)
            .one(&*self.db)
            .await?;
        if found.is_none() {
            return Err(ServiceError::invalid_field(
                "collection_id",
                format!("Collection {} does not exist", collection_id),
            ));
        }
        Ok(())
    }

    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_product(&self, input: ProductInput) -> Result<product::Model, ServiceError> {
        input.validate()?;
        self.ensure_collection_exists(input.collection_id).await?;

        let created = product::ActiveModel {
            title: Set(input.title),
            slug: Set(input.slug),
            description: Set(input.description),
            unit_price: Set(input.unit_price),
            inventory: Set(input.inventory),
            collection_id: Set(input.collection_id),
            last_update: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = created.id, "Product created");
        Ok(created)
    }

    /// Replaces a product's attributes. Existing order items keep their
    /// captured prices.
    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        id: i32,
        input: ProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        let existing = self.get_product(id).await?;
        self.ensure_collection_exists(input.collection_id).await?;

        let mut active: product::ActiveModel = existing.into();
        active.title = Set(input.title);
        active.slug = Set(input.slug);
        active.description = Set(input.description);
        active.unit_price = Set(input.unit_price);
        active.inventory = Set(input.inventory);
        active.collection_id = Set(input.collection_id);
        active.last_update = Set(Utc::now());

        Ok(active.update(&*self.db).await?)
    }

    /// Deletes a product that no order item references.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: i32) -> Result<(), ServiceError> {
        let existing = self.get_product(id).await?;

        let referencing = order_item::Entity::find()
            .filter(order_item::Column::ProductId.eq(id))
            .count(&*self.db)
            .await?;
        if referencing > 0 {
            return Err(ServiceError::MethodNotAllowed(
                "Product cannot be deleted because it is associated with an order item"
                    .to_string(),
            ));
        }

        product::Entity::delete_by_id(existing.id)
            .exec(&*self.db)
            .await?;
        info!(product_id = id, "Product deleted");
        Ok(())
    }
}
