use crate::auth::{AccessPolicy, AuthRouterExt};
use crate::entities::{product, review};
use crate::handlers::common::{created, ok, page_request, ApiJson, ApiQuery, PageParams};
use crate::{
    errors::ServiceError,
    services::{
        catalog::{ProductFilter, ProductInput, ProductOrdering},
        reviews::ReviewInput,
        CatalogService,
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
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize)]
pub struct ProductPath {
    pub product_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct ReviewPath {
    pub product_id: i32,
    pub review_id: i32,
}

/// Query parameters accepted by the product listing
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProductListParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub collection_id: Option<i32>,
    #[serde(rename = "unit_price__gt")]
    #[param(value_type = Option<String>)]
    pub unit_price_gt: Option<Decimal>,
    #[serde(rename = "unit_price__lt")]
    #[param(value_type = Option<String>)]
    pub unit_price_lt: Option<Decimal>,
    /// Case-insensitive match against title and description
    pub search: Option<String>,
    /// One of `unit_price`, `title`, `last_update`, optionally prefixed with `-`
    pub ordering: Option<String>,
}

impl ProductListParams {
    fn filter(&self) -> Result<ProductFilter, ServiceError> {
        let ordering = self
            .ordering
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .map(|raw| {
                ProductOrdering::from_str(raw).map_err(|_| {
                    ServiceError::ValidationError(format!("Unsupported ordering `{}`", raw))
                })
            })
            .transpose()?;

        Ok(ProductFilter {
            collection_id: self.collection_id,
            unit_price_gt: self.unit_price_gt,
            unit_price_lt: self.unit_price_lt,
            search: self.search.clone(),
            ordering,
        })
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "9.99")]
    pub unit_price: Decimal,
    /// Unit price including tax, rounded to cents
    #[schema(value_type = String, example = "12.99")]
    pub price_with_tax: Decimal,
    pub inventory: i32,
    pub collection_id: i32,
    pub last_update: DateTime<Utc>,
}

impl ProductResponse {
    fn new(product: product::Model, catalog: &CatalogService) -> Self {
        Self {
            price_with_tax: catalog.price_with_tax(product.unit_price),
            id: product.id,
            title: product.title,
            slug: product.slug,
            description: product.description,
            unit_price: product.unit_price,
            inventory: product.inventory,
            collection_id: product.collection_id,
            last_update: product.last_update,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReviewResponse {
    pub id: i32,
    pub product_id: i32,
    pub name: String,
    pub description: String,
    pub date: NaiveDate,
}

impl From<review::Model> for ReviewResponse {
    fn from(review: review::Model) -> Self {
        Self {
            id: review.id,
            product_id: review.product_id,
            name: review.name,
            description: review.description,
            date: review.date,
        }
    }
}

/// Creates the router for product and nested review endpoints
pub fn routes() -> Router<AppState> {
    let products = Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:product_id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .with_policy(AccessPolicy::AdminOrReadOnly);

    let reviews = Router::new()
        .route(
            "/:product_id/reviews",
            get(list_reviews).post(create_review),
        )
        .route(
            "/:product_id/reviews/:review_id",
            get(get_review).put(update_review).delete(delete_review),
        )
        .with_policy(AccessPolicy::AllowAny);

    products.merge(reviews)
}

/// List products with filtering, search and ordering
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductListParams),
    responses(
        (status = 200, description = "Products page", body = crate::ApiResponse<crate::PaginatedResponse<ProductResponse>>),
        (status = 400, description = "Invalid query", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ProductListParams>,
) -> ApiResult<PaginatedResponse<ProductResponse>> {
    let filter = params.filter()?;
    let page = page_request(params.page, params.page_size, &state.config);
    let catalog = &state.services.catalog;

    let products = catalog.list_products(&filter, page).await?;
    Ok(ok(products.map(|p| ProductResponse::new(p, catalog))))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{product_id}",
    params(("product_id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = crate::ApiResponse<ProductResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(path): Path<ProductPath>,
) -> ApiResult<ProductResponse> {
    let catalog = &state.services.catalog;
    let product = catalog.get_product(path.product_id).await?;
    Ok(ok(ProductResponse::new(product, catalog)))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = ProductInput,
    responses(
        (status = 201, description = "Product created", body = crate::ApiResponse<ProductResponse>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let catalog = &state.services.catalog;
    let product = catalog.create_product(input).await?;
    Ok(created(ProductResponse::new(product, catalog)))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{product_id}",
    params(("product_id" = i32, Path, description = "Product id")),
    request_body = ProductInput,
    responses(
        (status = 200, description = "Product updated", body = crate::ApiResponse<ProductResponse>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(path): Path<ProductPath>,
    ApiJson(input): ApiJson<ProductInput>,
) -> ApiResult<ProductResponse> {
    let catalog = &state.services.catalog;
    let product = catalog.update_product(path.product_id, input).await?;
    Ok(ok(ProductResponse::new(product, catalog)))
}

/// Delete a product; refused once any order item references it
#[utoipa::path(
    delete,
    path = "/api/v1/products/{product_id}",
    params(("product_id" = i32, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 405, description = "Product is referenced by an order item", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(path): Path<ProductPath>,
) -> Result<StatusCode, ServiceError> {
    state
        .services
        .catalog
        .delete_product(path.product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{product_id}/reviews",
    params(("product_id" = i32, Path, description = "Product id"), PageParams),
    responses(
        (status = 200, description = "Reviews page", body = crate::ApiResponse<crate::PaginatedResponse<ReviewResponse>>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Reviews"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(path): Path<ProductPath>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<PaginatedResponse<ReviewResponse>> {
    let page = params.resolve(&state.config);
    let reviews = state.services.reviews.list(path.product_id, page).await?;
    Ok(ok(reviews.map(ReviewResponse::from)))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{product_id}/reviews/{review_id}",
    params(
        ("product_id" = i32, Path, description = "Product id"),
        ("review_id" = i32, Path, description = "Review id")
    ),
    responses(
        (status = 200, description = "Review", body = crate::ApiResponse<ReviewResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Reviews"
)]
pub async fn get_review(
    State(state): State<AppState>,
    Path(path): Path<ReviewPath>,
) -> ApiResult<ReviewResponse> {
    let review = state
        .services
        .reviews
        .get(path.product_id, path.review_id)
        .await?;
    Ok(ok(review.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/products/{product_id}/reviews",
    params(("product_id" = i32, Path, description = "Product id")),
    request_body = ReviewInput,
    responses(
        (status = 201, description = "Review created", body = crate::ApiResponse<ReviewResponse>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Reviews"
)]
pub async fn create_review(
    State(state): State<AppState>,
    Path(path): Path<ProductPath>,
    ApiJson(input): ApiJson<ReviewInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let review = state.services.reviews.create(path.product_id, input).await?;
    Ok(created(ReviewResponse::from(review)))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{product_id}/reviews/{review_id}",
    params(
        ("product_id" = i32, Path, description = "Product id"),
        ("review_id" = i32, Path, description = "Review id")
    ),
    request_body = ReviewInput,
    responses(
        (status = 200, description = "Review updated", body = crate::ApiResponse<ReviewResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Reviews"
)]
pub async fn update_review(
    State(state): State<AppState>,
    Path(path): Path<ReviewPath>,
    ApiJson(input): ApiJson<ReviewInput>,
) -> ApiResult<ReviewResponse> {
    let review = state
        .services
        .reviews
        .update(path.product_id, path.review_id, input)
        .await?;
    Ok(ok(review.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{product_id}/reviews/{review_id}",
    params(
        ("product_id" = i32, Path, description = "Product id"),
        ("review_id" = i32, Path, description = "Review id")
    ),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Reviews"
)]
pub async fn delete_review(
    State(state): State<AppState>,
    Path(path): Path<ReviewPath>,
) -> Result<StatusCode, ServiceError> {
    state
        .services
        .reviews
        .delete(path.product_id, path.review_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
