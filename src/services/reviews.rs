use crate::{
    entities::{product, review},
    errors::ServiceError,
    services::{fetch_page, PageRequest},
    PaginatedResponse,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

/// Body accepted when creating or replacing a review. The product is always
/// taken from the route.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ReviewInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1))]
    pub description: String,
}

/// Product reviews, always addressed through their product.
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
}

impl ReviewService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn ensure_product(&self, product_id: i32) -> Result<(), ServiceError> {
        product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        product_id: i32,
        page: PageRequest,
    ) -> Result<PaginatedResponse<review::Model>, ServiceError> {
        self.ensure_product(product_id).await?;
        let query = review::Entity::find()
            .filter(review::Column::ProductId.eq(product_id))
            .order_by_asc(review::Column::Id);
        Ok(fetch_page(query, &*self.db, page).await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, product_id: i32, id: i32) -> Result<review::Model, ServiceError> {
        self.ensure_product(product_id).await?;
        review::Entity::find_by_id(id)
            .filter(review::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Review {} not found", id)))
    }

    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        product_id: i32,
        input: ReviewInput,
    ) -> Result<review::Model, ServiceError> {
        input.validate()?;
        self.ensure_product(product_id).await?;

        let created = review::ActiveModel {
            product_id: Set(product_id),
            name: Set(input.name),
            description: Set(input.description),
            date: Set(Utc::now().date_naive()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(product_id, review_id = created.id, "Review created");
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        product_id: i32,
        id: i32,
        input: ReviewInput,
    ) -> Result<review::Model, ServiceError> {
        input.validate()?;
        let existing = self.get(product_id, id).await?;

        let mut active: review::ActiveModel = existing.into();
        active.name = Set(input.name);
        active.description = Set(input.description);
        Ok(active.update(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, product_id: i32, id: i32) -> Result<(), ServiceError> {
        let existing = self.get(product_id, id).await?;
        review::Entity::delete_by_id(existing.id)
            .exec(&*self.db)
            .await?;
        info!(product_id, review_id = id, "Review deleted");
        Ok(())
    }
}
