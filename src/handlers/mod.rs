pub mod carts;
pub mod collections;
pub mod common;
pub mod customers;
pub mod orders;
pub mod products;

use crate::config::AppConfig;
use crate::events::EventBus;
use crate::services::{
    CartService, CatalogService, CheckoutService, CustomerService, OrderService, ReviewService,
    UserService,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub reviews: Arc<ReviewService>,
    pub carts: Arc<CartService>,
    pub customers: Arc<CustomerService>,
    pub orders: Arc<OrderService>,
    pub checkout: Arc<CheckoutService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, events: Arc<EventBus>, config: &AppConfig) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(db.clone(), config.tax_rate())),
            reviews: Arc::new(ReviewService::new(db.clone())),
            carts: Arc::new(CartService::new(db.clone())),
            customers: Arc::new(CustomerService::new(db.clone())),
            orders: Arc::new(OrderService::new(db.clone())),
            checkout: Arc::new(CheckoutService::new(db.clone(), events.clone())),
            users: Arc::new(UserService::new(db, events)),
        }
    }
}
