use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod messages;

/// Response envelope returned by every inventory endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unauthorized,
    RateLimited,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
}

/// Payload of the reserve/release/deduct endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationStatus<T> {
    pub status: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub success: bool,
}

/// Numeric fields stay as raw JSON so malformed values surface as
/// validation failures instead of body rejections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub product_id: Option<String>,
    pub stock: Option<Value>,
    pub reserved_stock: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub stock: Option<Value>,
    pub reserved_stock: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReserveRequest {
    pub quantity: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListProductsQuery {
    pub stock: Option<String>,
    pub min_stock: Option<String>,
    pub max_stock: Option<String>,
    pub limit: Option<String>,
    pub page: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: None,
        }
    }

    pub fn paged(data: T, meta: PageMeta) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Some(meta),
        }
    }

    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                kind,
                message: message.into(),
            }),
            meta: None,
        }
    }
}

impl<T> OperationStatus<T> {
    pub fn new(status: &str, details: Option<T>) -> Self {
        Self {
            status: status.to_string(),
            success: true,
            details,
        }
    }
}

impl HealthStatus {
    pub fn running() -> Self {
        Self {
            status: "running".to_string(),
            success: true,
        }
    }
}
