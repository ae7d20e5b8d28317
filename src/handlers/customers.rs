use crate::auth::{consts as perm, AccessPolicy, AuthRouterExt};
use crate::context::RequestContext;
use crate::entities::customer;
use crate::handlers::common::{created, ok, ApiJson, ApiQuery, PageParams};
use crate::{
    errors::ServiceError,
    services::{
        customers::{CreateCustomer, UpdateCustomer},
        orders::OrderDetail,
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
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize)]
pub struct CustomerPath {
    pub customer_id: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CustomerResponse {
    pub id: i32,
    pub user_id: i32,
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
    pub membership: customer::Membership,
}

impl From<customer::Model> for CustomerResponse {
    fn from(model: customer::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            phone: model.phone,
            birth_date: model.birth_date,
            membership: model.membership,
        }
    }
}

/// Creates the router for customer endpoints
pub fn routes() -> Router<AppState> {
    let staff = Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route(
            "/:customer_id",
            get(get_customer)
                .put(update_customer)
                .delete(delete_customer),
        )
        .with_policy(AccessPolicy::Staff);

    let me = Router::new()
        .route("/me", get(get_me).put(update_me))
        .with_policy(AccessPolicy::Authenticated);

    let history = Router::new()
        .route("/:customer_id/history", get(customer_history))
        .with_policy(AccessPolicy::Permission(perm::CUSTOMERS_VIEW_HISTORY));

    staff.merge(me).merge(history)
}

#[utoipa::path(
    get,
    path = "/api/v1/customers",
    params(PageParams),
    responses(
        (status = 200, description = "Customers page", body = crate::ApiResponse<crate::PaginatedResponse<CustomerResponse>>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<PaginatedResponse<CustomerResponse>> {
    let page = params.resolve(&state.config);
    let customers = state.services.customers.list(page).await?;
    Ok(ok(customers.map(CustomerResponse::from)))
}

#[utoipa::path(
    get,
    path = "/api/v1/customers/{customer_id}",
    params(("customer_id" = i32, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer", body = crate::ApiResponse<CustomerResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(path): Path<CustomerPath>,
) -> ApiResult<CustomerResponse> {
    let customer = state.services.customers.get(path.customer_id).await?;
    Ok(ok(customer.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/customers",
    request_body = CreateCustomer,
    responses(
        (status = 201, description = "Customer created", body = crate::ApiResponse<CustomerResponse>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 409, description = "User already has a profile", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CreateCustomer>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer = state.services.customers.create(input).await?;
    Ok(created(CustomerResponse::from(customer)))
}

#[utoipa::path(
    put,
    path = "/api/v1/customers/{customer_id}",
    params(("customer_id" = i32, Path, description = "Customer id")),
    request_body = UpdateCustomer,
    responses(
        (status = 200, description = "Customer updated", body = crate::ApiResponse<CustomerResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn update_customer(
    State(state): State<AppState>,
    Path(path): Path<CustomerPath>,
    ApiJson(input): ApiJson<UpdateCustomer>,
) -> ApiResult<CustomerResponse> {
    let customer = state
        .services
        .customers
        .update(path.customer_id, input)
        .await?;
    Ok(ok(customer.into()))
}

/// Delete a customer; refused while they own orders
#[utoipa::path(
    delete,
    path = "/api/v1/customers/{customer_id}",
    params(("customer_id" = i32, Path, description = "Customer id")),
    responses(
        (status = 204, description = "Customer deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 405, description = "Customer has orders", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(path): Path<CustomerPath>,
) -> Result<StatusCode, ServiceError> {
    state.services.customers.delete(path.customer_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's own customer profile
#[utoipa::path(
    get,
    path = "/api/v1/customers/me",
    responses(
        (status = 200, description = "Own profile", body = crate::ApiResponse<CustomerResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No profile", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn get_me(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> ApiResult<CustomerResponse> {
    let customer = state.services.customers.me(&ctx).await?;
    Ok(ok(customer.into()))
}

#[utoipa::path(
    put,
    path = "/api/v1/customers/me",
    request_body = UpdateCustomer,
    responses(
        (status = 200, description = "Own profile updated", body = crate::ApiResponse<CustomerResponse>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn update_me(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiJson(input): ApiJson<UpdateCustomer>,
) -> ApiResult<CustomerResponse> {
    let customer = state.services.customers.update_me(&ctx, input).await?;
    Ok(ok(customer.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/customers/{customer_id}/history",
    params(("customer_id" = i32, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Orders placed by the customer", body = crate::ApiResponse<Vec<OrderDetail>>),
        (status = 403, description = "Missing customers:view_history permission"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn customer_history(
    State(state): State<AppState>,
    Path(path): Path<CustomerPath>,
) -> ApiResult<Vec<OrderDetail>> {
    Ok(ok(state.services.customers.history(path.customer_id).await?))
}
