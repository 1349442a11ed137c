use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use serde::Serialize;
use shared::*;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{self, Authenticator, Holder};
use crate::error::InventoryError;
use crate::models::Product;
use crate::rate_limit::{self, RateLimiter};
use crate::reservation::Reservation;
use crate::service::InventoryService;
use crate::store::{HolderKey, ReserveStock};
use crate::validation::{self, PageDefaults};

#[derive(Clone)]
pub struct AppState {
    pub service: InventoryService,
    pub pagination: PageDefaults,
    pub auth: Authenticator,
    pub limiter: RateLimiter,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub released_count: usize,
    pub reservations: Vec<Reservation>,
}

type ApiResult<T> = Result<T, InventoryError>;

pub fn create_router(state: AppState) -> Router {
    let inventory = Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/cron/release-expired", post(release_expired))
        .route(
            "/:product_id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/:product_id/reserve", post(reserve_stock))
        .route("/:product_id/release", post(release_stock))
        .route("/:product_id/deduct", post(deduct_stock))
        .route("/:product_id/reservation", get(get_reservation))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth::authenticate,
        ));

    Router::new()
        .route("/api/inventory/health", get(health_check))
        .nest("/api/inventory", inventory)
        .layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit::limit_by_ip,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

impl IntoResponse for InventoryError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = match kind {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &self {
            InventoryError::ProductNotFound(_) => messages::PRODUCT_NOT_FOUND.to_string(),
            InventoryError::NoActiveReservation { .. } | InventoryError::ReservationNotFound { .. } => {
                messages::RESERVATION_NOT_FOUND.to_string()
            }
            // Logged by the service.
            InventoryError::Storage(_) => messages::INTERNAL_ERROR.to_string(),
            other => other.to_string(),
        };
        (status, Json(ApiResponse::<()>::failed(kind, message))).into_response()
    }
}

fn holder_key(product_id: &str, holder: Option<Extension<Holder>>, missing: &str) -> ApiResult<HolderKey> {
    let product_id = validation::identifier(Some(product_id), messages::PRODUCT_ID_REQUIRED)?;
    let Some(Extension(Holder(holder_id))) = holder else {
        return Err(InventoryError::validation(missing));
    };
    let key = HolderKey::new(product_id, holder_id);
    key.validate()?;
    Ok(key)
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Product>>>> {
    let filter = validation::stock_filter(&query)?;
    let page = validation::page_request(&query, state.pagination);
    let products = state.service.list_products(filter, page).await?;
    Ok(Json(ApiResponse::paged(
        products,
        PageMeta {
            page: page.page,
            limit: page.limit,
        },
    )))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> ApiResult<Json<ApiResponse<Product>>> {
    let product = state.service.get_product(&product_id).await?;
    Ok(Json(ApiResponse::success(product)))
}

pub async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Product>>)> {
    let Json(request) = payload.map_err(|_| InventoryError::validation(messages::INVALID_PRODUCT_DATA))?;
    let product = state.service.create_product(validation::new_product(&request)?).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(product))))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    payload: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<Product>>> {
    let Json(request) =
        payload.map_err(|_| InventoryError::validation(messages::INVALID_STOCK_OR_RESERVED_STOCK))?;
    let changes = validation::stock_changes(&request)?;
    let product = state.service.update_product(&product_id, changes).await?;
    Ok(Json(ApiResponse::success(product)))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.service.delete_product(&product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reserve_stock(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    holder: Option<Extension<Holder>>,
    payload: Result<Json<ReserveRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<OperationStatus<Reservation>>>)> {
    let key = holder_key(&product_id, holder, messages::HOLDER_ID_REQUIRED_RESERVE)?;
    let Json(request) =
        payload.map_err(|_| InventoryError::validation(messages::INVALID_PRODUCT_ID_OR_QUANTITY))?;
    let quantity = validation::quantity(request.quantity.as_ref())?;

    let reservation = state
        .service
        .reserve(ReserveStock {
            product_id: key.product_id,
            holder_id: key.holder_id,
            quantity,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(OperationStatus::new(
            messages::STOCK_RESERVED,
            Some(reservation),
        ))),
    ))
}

pub async fn release_stock(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    holder: Option<Extension<Holder>>,
) -> ApiResult<Json<ApiResponse<OperationStatus<Reservation>>>> {
    let key = holder_key(&product_id, holder, messages::HOLDER_ID_REQUIRED_RELEASE)?;
    let reservation = state.service.release(key).await?;
    Ok(Json(ApiResponse::success(OperationStatus::new(
        messages::RESERVED_STOCK_RELEASED,
        Some(reservation),
    ))))
}

pub async fn deduct_stock(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    holder: Option<Extension<Holder>>,
) -> ApiResult<Json<ApiResponse<OperationStatus<Reservation>>>> {
    let key = holder_key(&product_id, holder, messages::HOLDER_ID_REQUIRED_DEDUCT)?;
    let reservation = state.service.deduct(key).await?;
    Ok(Json(ApiResponse::success(OperationStatus::new(
        messages::STOCK_DEDUCTED,
        Some(reservation),
    ))))
}

pub async fn get_reservation(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    holder: Option<Extension<Holder>>,
) -> ApiResult<Json<ApiResponse<Reservation>>> {
    let key = holder_key(&product_id, holder, messages::HOLDER_ID_REQUIRED_LOOKUP)?;
    let reservation = state.service.active_reservation(key).await?;
    Ok(Json(ApiResponse::success(reservation)))
}

pub async fn release_expired(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<OperationStatus<SweepReport>>>> {
    let released = state.service.expire_all().await?;
    let report = SweepReport {
        released_count: released.len(),
        reservations: released,
    };
    Ok(Json(ApiResponse::success(OperationStatus::new(
        messages::CRON_JOB_EXECUTED,
        Some(report),
    ))))
}

pub async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus::running())
}
