//! sea-orm entities for the storefront schema.

pub mod cart;
pub mod cart_item;
pub mod collection;
pub mod customer;
pub mod order;
pub mod order_item;
pub mod product;
pub mod review;
pub mod user;

pub mod prelude {
    pub use super::cart::Entity as Cart;
    pub use super::cart_item::Entity as CartItem;
    pub use super::collection::Entity as Collection;
    pub use super::customer::Entity as Customer;
    pub use super::order::Entity as Order;
    pub use super::order_item::Entity as OrderItem;
    pub use super::product::Entity as Product;
    pub use super::review::Entity as Review;
    pub use super::user::Entity as User;
}
