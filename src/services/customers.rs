use crate::{
    context::RequestContext,
    entities::{customer, order, user},
    errors::ServiceError,
    services::{
        fetch_page,
        orders::{load_order_details, OrderDetail},
        PageRequest,
    },
    PaginatedResponse,
};
use chrono::NaiveDate;
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

/// Creates the customer profile for `user_id` unless one already exists.
///
/// Returns `true` when a row was inserted. Safe to call any number of times
/// for the same user, concurrently included.
pub async fn provision_customer<C: ConnectionTrait>(conn: &C, user_id: i32) -> Result<bool, DbErr> {
    let profile = customer::ActiveModel {
        user_id: Set(user_id),
        phone: Set(String::new()),
        birth_date: Set(None),
        membership: Set(customer::Membership::default()),
        ..Default::default()
    };

    let inserted = customer::Entity::insert(profile)
        .on_conflict(
            OnConflict::column(customer::Column::UserId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
    Ok(inserted > 0)
}

/// Staff-supplied profile for an existing user
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCustomer {
    pub user_id: i32,
    #[validate(length(max = 255))]
    #[serde(default)]
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub membership: customer::Membership,
}

/// Full replacement of the editable profile fields
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateCustomer {
    #[validate(length(max = 255))]
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
    pub membership: customer::Membership,
}

#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: PageRequest,
    ) -> Result<PaginatedResponse<customer::Model>, ServiceError> {
        let query = customer::Entity::find().order_by_asc(customer::Column::Id);
        Ok(fetch_page(query, &*self.db, page).await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<customer::Model, ServiceError> {
        customer::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", id)))
    }

    #[instrument(skip(self, input), fields(user_id = input.user_id))]
    pub async fn create(&self, input: CreateCustomer) -> Result<customer::Model, ServiceError> {
        input.validate()?;

        if user::Entity::find_by_id(input.user_id)
            .one(&*self.db)
            .await?
            .is_none()
        {
            return Err(ServiceError::invalid_field(
                "user_id",
                format!("User {} does not exist", input.user_id),
            ));
        }
        if self.find_by_user(input.user_id).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "User {} already has a customer profile",
                input.user_id
            )));
        }

        let created = customer::ActiveModel {
            user_id: Set(input.user_id),
            phone: Set(input.phone),
            birth_date: Set(input.birth_date),
            membership: Set(input.membership),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(customer_id = created.id, "Customer created");
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: i32,
        input: UpdateCustomer,
    ) -> Result<customer::Model, ServiceError> {
        input.validate()?;
        let existing = self.get(id).await?;
        self.apply_update(existing, input).await
    }

    /// Deletes a customer who has never placed an order.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;

        let orders = order::Entity::find()
            .filter(order::Column::CustomerId.eq(id))
            .count(&*self.db)
            .await?;
        if orders > 0 {
            return Err(ServiceError::MethodNotAllowed(
                "Customer cannot be deleted because they have placed orders".to_string(),
            ));
        }

        customer::Entity::delete_by_id(existing.id)
            .exec(&*self.db)
            .await?;
        info!(customer_id = id, "Customer deleted");
        Ok(())
    }

    /// The caller's own profile.
    #[instrument(skip(self, ctx))]
    pub async fn me(&self, ctx: &RequestContext) -> Result<customer::Model, ServiceError> {
        let caller = ctx.caller()?;
        self.find_by_user(caller.user_id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("No customer profile for user {}", caller.user_id))
        })
    }

    #[instrument(skip(self, ctx, input))]
    pub async fn update_me(
        &self,
        ctx: &RequestContext,
        input: UpdateCustomer,
    ) -> Result<customer::Model, ServiceError> {
        input.validate()?;
        let existing = self.me(ctx).await?;
        self.apply_update(existing, input).await
    }

    /// Orders placed by a customer, newest last.
    #[instrument(skip(self))]
    pub async fn history(&self, id: i32) -> Result<Vec<OrderDetail>, ServiceError> {
        let existing = self.get(id).await?;
        let orders = order::Entity::find()
            .filter(order::Column::CustomerId.eq(existing.id))
            .order_by_asc(order::Column::PlacedAt)
            .order_by_asc(order::Column::Id)
            .all(&*self.db)
            .await?;
        load_order_details(&*self.db, orders).await
    }

    async fn find_by_user(&self, user_id: i32) -> Result<Option<customer::Model>, ServiceError> {
        Ok(customer::Entity::find()
            .filter(customer::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?)
    }

    async fn apply_update(
        &self,
        existing: customer::Model,
        input: UpdateCustomer,
    ) -> Result<customer::Model, ServiceError> {
        let mut active: customer::ActiveModel = existing.into();
        active.phone = Set(input.phone);
        active.birth_date = Set(input.birth_date);
        active.membership = Set(input.membership);
        Ok(active.update(&*self.db).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_defaults_to_bronze_when_omitted() {
        let input: CreateCustomer = serde_json::from_value(serde_json::json!({"user_id": 3})).unwrap();
        assert_eq!(input.membership, customer::Membership::Bronze);
        assert!(input.phone.is_empty());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn unknown_membership_is_rejected() {
        let parsed: Result<UpdateCustomer, _> = serde_json::from_value(serde_json::json!({
            "phone": "555-0100",
            "birth_date": null,
            "membership": "platinum"
        }));
        assert!(parsed.is_err());
    }
}
