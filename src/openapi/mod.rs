use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront API

Catalog browsing, anonymous carts, customer profiles and checkout.

## Authentication

Read-only catalog and cart endpoints accept anonymous requests. Everything
else expects a bearer JWT:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

Failures share one body shape:

```json
{
  "error": "Not Found",
  "message": "Cart 550e8400-e29b-41d4-a716-446655440000 not found",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

List endpoints accept `page` (default 1) and `page_size` (server default,
capped by the configured maximum).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Collections", description = "Product collections"),
        (name = "Products", description = "Catalog products"),
        (name = "Reviews", description = "Product reviews"),
        (name = "Carts", description = "Anonymous shopping carts"),
        (name = "Customers", description = "Customer profiles"),
        (name = "Orders", description = "Checkout and order management")
    ),
    paths(
        // Collections
        crate::handlers::collections::list_collections,
        crate::handlers::collections::get_collection,
        crate::handlers::collections::create_collection,
        crate::handlers::collections::update_collection,
        crate::handlers::collections::delete_collection,

        // Products & reviews
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::products::list_reviews,
        crate::handlers::products::get_review,
        crate::handlers::products::create_review,
        crate::handlers::products::update_review,
        crate::handlers::products::delete_review,

        // Carts
        crate::handlers::carts::create_cart,
        crate::handlers::carts::get_cart,
        crate::handlers::carts::delete_cart,
        crate::handlers::carts::list_items,
        crate::handlers::carts::get_item,
        crate::handlers::carts::add_item,
        crate::handlers::carts::update_item,
        crate::handlers::carts::remove_item,

        // Customers
        crate::handlers::customers::list_customers,
        crate::handlers::customers::get_customer,
        crate::handlers::customers::create_customer,
        crate::handlers::customers::update_customer,
        crate::handlers::customers::delete_customer,
        crate::handlers::customers::get_me,
        crate::handlers::customers::update_me,
        crate::handlers::customers::customer_history,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::create_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::delete_order,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::errors::FieldError,
            crate::entities::customer::Membership,
            crate::entities::order::PaymentStatus,
        )
    )
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
