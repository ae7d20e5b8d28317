use crate::{
    entities::user,
    errors::ServiceError,
    events::{DomainEvent, EventBus},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

/// Identity record as registered by the admin tooling
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_staff: bool,
}

/// User identities. Creating one announces `UserCreated`, which provisions
/// the matching customer profile.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    events: Arc<EventBus>,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn create_user(&self, input: NewUser) -> Result<user::Model, ServiceError> {
        input.validate()?;

        if self.find_by_username(&input.username).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Username {} is already taken",
                input.username
            )));
        }

        let created = user::ActiveModel {
            username: Set(input.username),
            email: Set(input.email),
            first_name: Set(input.first_name),
            last_name: Set(input.last_name),
            is_staff: Set(input.is_staff),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(user_id = created.id, "User created");
        self.events
            .publish(DomainEvent::UserCreated {
                user_id: created.id,
                username: created.username.clone(),
            })
            .await;

        Ok(created)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&*self.db)
            .await?)
    }
}
