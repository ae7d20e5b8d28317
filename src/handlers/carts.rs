use crate::auth::{AccessPolicy, AuthRouterExt};
use crate::handlers::common::{created, ok, ApiJson};
use crate::{
    errors::ServiceError,
    services::carts::{AddCartItem, CartDetail, CartLine, UpdateCartItem},
    ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CartPath {
    pub cart_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CartItemPath {
    pub cart_id: Uuid,
    pub item_id: i32,
}

/// Creates the router for cart endpoints. Carts are anonymous; holding the
/// cart id is what grants access to it.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_cart))
        .route("/:cart_id", get(get_cart).delete(delete_cart))
        .route("/:cart_id/items", get(list_items).post(add_item))
        .route(
            "/:cart_id/items/:item_id",
            get(get_item).patch(update_item).delete(remove_item),
        )
        .with_policy(AccessPolicy::AllowAny)
}

#[utoipa::path(
    post,
    path = "/api/v1/carts",
    responses(
        (status = 201, description = "Empty cart created", body = crate::ApiResponse<CartDetail>)
    ),
    tag = "Carts"
)]
pub async fn create_cart(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.carts.create_cart().await?;
    Ok(created(cart))
}

#[utoipa::path(
    get,
    path = "/api/v1/carts/{cart_id}",
    params(("cart_id" = Uuid, Path, description = "Cart id")),
    responses(
        (status = 200, description = "Cart with priced lines", body = crate::ApiResponse<CartDetail>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Path(path): Path<CartPath>,
) -> ApiResult<CartDetail> {
    Ok(ok(state.services.carts.get_cart(path.cart_id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/carts/{cart_id}",
    params(("cart_id" = Uuid, Path, description = "Cart id")),
    responses(
        (status = 204, description = "Cart deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn delete_cart(
    State(state): State<AppState>,
    Path(path): Path<CartPath>,
) -> Result<StatusCode, ServiceError> {
    state.services.carts.delete_cart(path.cart_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/carts/{cart_id}/items",
    params(("cart_id" = Uuid, Path, description = "Cart id")),
    responses(
        (status = 200, description = "Cart lines", body = crate::ApiResponse<Vec<CartLine>>),
        (status = 404, description = "Cart not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Path(path): Path<CartPath>,
) -> ApiResult<Vec<CartLine>> {
    Ok(ok(state.services.carts.list_items(path.cart_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/carts/{cart_id}/items/{item_id}",
    params(
        ("cart_id" = Uuid, Path, description = "Cart id"),
        ("item_id" = i32, Path, description = "Cart item id")
    ),
    responses(
        (status = 200, description = "Cart line", body = crate::ApiResponse<CartLine>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(path): Path<CartItemPath>,
) -> ApiResult<CartLine> {
    Ok(ok(state
        .services
        .carts
        .get_item(path.cart_id, path.item_id)
        .await?))
}

/// Add a product to the cart; adding it again increments the quantity
#[utoipa::path(
    post,
    path = "/api/v1/carts/{cart_id}/items",
    params(("cart_id" = Uuid, Path, description = "Cart id")),
    request_body = AddCartItem,
    responses(
        (status = 201, description = "Line added or incremented", body = crate::ApiResponse<CartLine>),
        (status = 400, description = "Unknown product or bad quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cart not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn add_item(
    State(state): State<AppState>,
    Path(path): Path<CartPath>,
    ApiJson(input): ApiJson<AddCartItem>,
) -> Result<impl IntoResponse, ServiceError> {
    let line = state.services.carts.add_item(path.cart_id, input).await?;
    Ok(created(line))
}

#[utoipa::path(
    patch,
    path = "/api/v1/carts/{cart_id}/items/{item_id}",
    params(
        ("cart_id" = Uuid, Path, description = "Cart id"),
        ("item_id" = i32, Path, description = "Cart item id")
    ),
    request_body = UpdateCartItem,
    responses(
        (status = 200, description = "Quantity updated", body = crate::ApiResponse<CartLine>),
        (status = 400, description = "Bad quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn update_item(
    State(state): State<AppState>,
    Path(path): Path<CartItemPath>,
    ApiJson(input): ApiJson<UpdateCartItem>,
) -> ApiResult<CartLine> {
    Ok(ok(state
        .services
        .carts
        .update_item(path.cart_id, path.item_id, input)
        .await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/carts/{cart_id}/items/{item_id}",
    params(
        ("cart_id" = Uuid, Path, description = "Cart id"),
        ("item_id" = i32, Path, description = "Cart item id")
    ),
    responses(
        (status = 204, description = "Line removed"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    Path(path): Path<CartItemPath>,
) -> Result<StatusCode, ServiceError> {
    state
        .services
        .carts
        .remove_item(path.cart_id, path.item_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
