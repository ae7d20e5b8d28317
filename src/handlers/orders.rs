use crate::auth::{AccessPolicy, AuthRouterExt};
use crate::context::RequestContext;
use crate::handlers::common::{created, ok, ApiJson, ApiQuery, PageParams};
use crate::{
    errors::ServiceError,
    services::{
        checkout::CreateOrderRequest,
        orders::{OrderDetail, UpdateOrder},
    },
    ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct OrderPath {
    pub order_id: i32,
}

/// Creates the router for order endpoints
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route(
            "/:order_id",
            get(get_order).patch(update_order).delete(delete_order),
        )
        .with_policy(AccessPolicy::StaffWrites)
}

/// List orders; staff see every order, other callers only their own
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(PageParams),
    responses(
        (status = 200, description = "Orders page", body = crate::ApiResponse<crate::PaginatedResponse<OrderDetail>>),
        (status = 401, description = "Unauthorized")
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<PaginatedResponse<OrderDetail>> {
    let page = params.resolve(&state.config);
    Ok(ok(state.services.orders.list(&ctx, page).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_id}",
    params(("order_id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = crate::ApiResponse<OrderDetail>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(path): Path<OrderPath>,
) -> ApiResult<OrderDetail> {
    Ok(ok(state.services.orders.get(&ctx, path.order_id).await?))
}

/// Check out a cart. The order belongs to the authenticated caller.
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = crate::ApiResponse<OrderDetail>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Cart or customer not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Cart checked out concurrently", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiJson(request): ApiJson<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.checkout.place_order(&ctx, request).await?;
    Ok(created(order))
}

/// Change an order's payment status (staff only)
#[utoipa::path(
    patch,
    path = "/api/v1/orders/{order_id}",
    params(("order_id" = i32, Path, description = "Order id")),
    request_body = UpdateOrder,
    responses(
        (status = 200, description = "Order updated", body = crate::ApiResponse<OrderDetail>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    Path(path): Path<OrderPath>,
    ApiJson(input): ApiJson<UpdateOrder>,
) -> ApiResult<OrderDetail> {
    Ok(ok(state
        .services
        .orders
        .update_payment_status(path.order_id, input)
        .await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{order_id}",
    params(("order_id" = i32, Path, description = "Order id")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(path): Path<OrderPath>,
) -> Result<StatusCode, ServiceError> {
    state.services.orders.delete(path.order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
