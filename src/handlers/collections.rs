use crate::auth::{AccessPolicy, AuthRouterExt};
use crate::handlers::common::{created, ok, ApiJson, ApiQuery, PageParams};
use crate::{
    errors::ServiceError,
    services::catalog::{CollectionInput, CollectionWithCount},
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
pub struct CollectionPath {
    pub collection_id: i32,
}

/// Creates the router for collection endpoints
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_collections).post(create_collection))
        .route(
            "/:collection_id",
            get(get_collection)
                .put(update_collection)
                .delete(delete_collection),
        )
        .with_policy(AccessPolicy::AdminOrReadOnly)
}

/// List collections with their product counts
#[utoipa::path(
    get,
    path = "/api/v1/collections",
    params(PageParams),
    responses(
        (status = 200, description = "Collections page", body = crate::ApiResponse<crate::PaginatedResponse<CollectionWithCount>>)
    ),
    tag = "Collections"
)]
pub async fn list_collections(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<PaginatedResponse<CollectionWithCount>> {
    let page = params.resolve(&state.config);
    Ok(ok(state.services.catalog.list_collections(page).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/collections/{collection_id}",
    params(("collection_id" = i32, Path, description = "Collection id")),
    responses(
        (status = 200, description = "Collection", body = crate::ApiResponse<CollectionWithCount>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Collections"
)]
pub async fn get_collection(
    State(state): State<AppState>,
    Path(path): Path<CollectionPath>,
) -> ApiResult<CollectionWithCount> {
    Ok(ok(state.services.catalog.get_collection(path.collection_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/collections",
    request_body = CollectionInput,
    responses(
        (status = 201, description = "Collection created", body = crate::ApiResponse<CollectionWithCount>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("Bearer" = [])),
    tag = "Collections"
)]
pub async fn create_collection(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CollectionInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let collection = state.services.catalog.create_collection(input).await?;
    Ok(created(collection))
}

#[utoipa::path(
    put,
    path = "/api/v1/collections/{collection_id}",
    params(("collection_id" = i32, Path, description = "Collection id")),
    request_body = CollectionInput,
    responses(
        (status = 200, description = "Collection updated", body = crate::ApiResponse<CollectionWithCount>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Collections"
)]
pub async fn update_collection(
    State(state): State<AppState>,
    Path(path): Path<CollectionPath>,
    ApiJson(input): ApiJson<CollectionInput>,
) -> ApiResult<CollectionWithCount> {
    Ok(ok(state
        .services
        .catalog
        .update_collection(path.collection_id, input)
        .await?))
}

/// Delete a collection; refused while products still belong to it
#[utoipa::path(
    delete,
    path = "/api/v1/collections/{collection_id}",
    params(("collection_id" = i32, Path, description = "Collection id")),
    responses(
        (status = 204, description = "Collection deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 405, description = "Collection still has products", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Collections"
)]
pub async fn delete_collection(
    State(state): State<AppState>,
    Path(path): Path<CollectionPath>,
) -> Result<StatusCode, ServiceError> {
    state
        .services
        .catalog
        .delete_collection(path.collection_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
