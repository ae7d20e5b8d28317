#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use serde_json::Value;
use storefront_api::{
    config::AppConfig,
    db,
    entities::{product, user},
    services::{
        catalog::{CollectionInput, ProductInput},
        users::NewUser,
    },
    AppState,
};
use tower::ServiceExt;

const TEST_JWT_SECRET: &str =
    "test_secret_key_for_integration_tests_that_is_comfortably_over_64_chars";

/// Helper harness for spinning up an application backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Construct a new test application with a fresh, migrated database.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single connection keeps every query on the same in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = storefront_api::app_router(state.clone());

        Self { router, state }
    }

    /// Registers a user through the service layer, which also provisions
    /// the customer profile.
    pub async fn create_user(&self, username: &str, is_staff: bool) -> user::Model {
        self.state
            .services
            .users
            .create_user(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                first_name: String::new(),
                last_name: String::new(),
                is_staff,
            })
            .await
            .expect("seed user for tests")
    }

    pub fn token_for(&self, user: &user::Model, permissions: &[&str]) -> String {
        let permissions: Vec<String> = permissions.iter().map(|p| p.to_string()).collect();
        self.state
            .auth
            .issue_token(user, &permissions)
            .expect("issue token for tests")
    }

    /// Creates a user and returns it with a bearer token.
    pub async fn login(&self, username: &str, is_staff: bool) -> (user::Model, String) {
        let user = self.create_user(username, is_staff).await;
        let token = self.token_for(&user, &[]);
        (user, token)
    }

    pub async fn seed_collection(&self, title: &str) -> i32 {
        self.state
            .services
            .catalog
            .create_collection(CollectionInput {
                title: title.to_string(),
            })
            .await
            .expect("seed collection for tests")
            .id
    }

    pub async fn seed_product(
        &self,
        collection_id: i32,
        title: &str,
        unit_price: Decimal,
    ) -> product::Model {
        self.state
            .services
            .catalog
            .create_product(ProductInput {
                title: title.to_string(),
                slug: title.to_lowercase().replace(' ', "-"),
                description: Some(format!("{title} seeded for integration tests")),
                unit_price,
                inventory: 10,
                collection_id,
            })
            .await
            .expect("seed product for tests")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Creates a cart over HTTP and returns its id.
    pub async fn create_cart(&self) -> String {
        let response = self.request(Method::POST, "/api/v1/carts", None, None).await;
        assert_eq!(response.status(), 201);
        let body = response_json(response).await;
        body["data"]["id"].as_str().expect("cart id").to_string()
    }

    pub async fn add_to_cart(&self, cart_id: &str, product_id: i32, quantity: i32) -> Response {
        self.request(
            Method::POST,
            &format!("/api/v1/carts/{cart_id}/items"),
            Some(serde_json::json!({ "product_id": product_id, "quantity": quantity })),
            None,
        )
        .await
    }

    pub async fn checkout(&self, cart_id: &str, token: Option<&str>) -> Response {
        self.request(
            Method::POST,
            "/api/v1/orders",
            Some(serde_json::json!({ "cart_id": cart_id })),
            token,
        )
        .await
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Decimals are serialized as strings; compare them by value.
pub fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected decimal string, got {value}"))
        .parse()
        .expect("decimal value")
}
