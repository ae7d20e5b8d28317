use crate::{config::AppConfig, errors::ServiceError, services::PageRequest, ApiResponse};
use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Query, Request,
    },
    http::{request::Parts, StatusCode},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::IntoParams;

/// JSON body extractor whose rejections use the standard error body
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ServiceError::ValidationError(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Query string extractor whose rejections use the standard error body
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection: QueryRejection| {
                ServiceError::ValidationError(rejection.body_text())
            })?;
        Ok(Self(value))
    }
}

/// Page-number pagination parameters
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageParams {
    /// 1-based page number
    pub page: Option<u64>,
    /// Items per page, capped by the server maximum
    pub page_size: Option<u64>,
}

impl PageParams {
    pub fn resolve(&self, config: &AppConfig) -> PageRequest {
        page_request(self.page, self.page_size, config)
    }
}

pub fn page_request(page: Option<u64>, page_size: Option<u64>, config: &AppConfig) -> PageRequest {
    PageRequest::new(
        page,
        page_size,
        config.api_default_page_size,
        config.api_max_page_size,
    )
}

/// Standard created response
pub fn created<T>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Standard success response
pub fn ok<T>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data))
}
