//! Handlers for restaurant stock items and their movements.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use crou_core::error::CoreError;
use crou_core::event_types::{ENTITY_STOCK_ITEM, EVT_STOCK_LOW};
use crou_core::restauration::{self, MovementKind};
use crou_core::roles::{PERM_RESTAURATION_READ, PERM_RESTAURATION_WRITE};
use crou_core::types::{Amount, DbId};
use crou_db::models::restauration::{CreateStockItem, StockItem, StockMovement};
use crou_db::repositories::{RestaurantRepo, StockRepo};
use crou_events::PlatformEvent;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::restaurants::find_restaurant_in_scope;
use crate::error::{AppError, AppResult};
use crate::middleware::scope::TenantScope;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStockItemRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 20, message = "must be 1-20 characters"))]
    pub unit: String,
    #[validate(range(min = 0.0, message = "cannot be negative"))]
    #[serde(default)]
    pub quantity: f64,
    #[validate(range(min = 0.0, message = "cannot be negative"))]
    #[serde(default)]
    pub alert_threshold: f64,
    #[validate(range(min = 0, message = "cannot be negative"))]
    pub unit_cost: Option<Amount>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MovementRequest {
    /// `in`, `out` or `adjustment`.
    pub kind: String,
    pub quantity: f64,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementResult {
    pub movement: StockMovement,
    pub item: StockItem,
    pub low_stock: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockParams {
    pub tenant_id: Option<DbId>,
}

/// POST /api/restauration/restaurants/{id}/stock
pub async fn create_stock_item(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(restaurant_id): Path<DbId>,
    Json(input): Json<CreateStockItemRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<StockItem>>)> {
    scope.require(&state.pool, PERM_RESTAURATION_WRITE).await?;
    input.validate()?;
    find_restaurant_in_scope(&state, &scope, restaurant_id).await?;

    let create_dto = CreateStockItem {
        restaurant_id,
        name: input.name,
        unit: input.unit,
        quantity: input.quantity,
        alert_threshold: input.alert_threshold,
        unit_cost: input.unit_cost,
    };
    let created = StockRepo::create(&state.pool, &create_dto).await?;
    tracing::info!(stock_item_id = created.id, restaurant_id, actor = scope.user_id(), "Stock item created");
    Ok((StatusCode::CREATED, Json(DataResponse::new(created))))
}

/// GET /api/restauration/restaurants/{id}/stock
pub async fn list_stock(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(restaurant_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<StockItem>>>> {
    scope.require(&state.pool, PERM_RESTAURATION_READ).await?;
    find_restaurant_in_scope(&state, &scope, restaurant_id).await?;
    let items = StockRepo::list(&state.pool, restaurant_id).await?;
    Ok(Json(DataResponse::new(items)))
}

/// GET /api/restauration/stock/low
pub async fn low_stock(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(params): Query<LowStockParams>,
) -> AppResult<Json<DataResponse<Vec<StockItem>>>> {
    scope.require(&state.pool, PERM_RESTAURATION_READ).await?;
    let path = scope.list_path(&state.pool, params.tenant_id).await?;
    let items = StockRepo::low_stock(&state.pool, &path).await?;
    Ok(Json(DataResponse::new(items)))
}

/// POST /api/restauration/stock/{id}/movements
///
/// Applies the movement under a row lock. Crossing the alert threshold
/// publishes a low-stock event.
pub async fn record_movement(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Json(input): Json<MovementRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<MovementResult>>)> {
    scope.require(&state.pool, PERM_RESTAURATION_WRITE).await?;
    input.validate()?;
    let kind = MovementKind::parse(&input.kind)?;
    let (_, tenant_id) = find_item_in_scope(&state, &scope, id).await?;

    let mut tx = state.pool.begin().await?;
    let mut item = StockRepo::lock(&mut tx, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Stock item", id }))?;
    let was_low = restauration::is_low_stock(item.quantity, item.alert_threshold);
    let resulting = restauration::apply_stock_movement(item.quantity, kind, input.quantity)?;

    let movement = StockRepo::record_movement(
        &mut tx,
        id,
        kind,
        input.quantity,
        resulting,
        input.reason.as_deref(),
        Some(scope.user_id()),
    )
    .await?;
    tx.commit().await?;

    item.quantity = resulting;
    let is_low = restauration::is_low_stock(item.quantity, item.alert_threshold);
    tracing::info!(
        stock_item_id = id,
        kind = kind.as_str(),
        quantity = input.quantity,
        resulting,
        actor = scope.user_id(),
        "Stock movement recorded"
    );

    if is_low && !was_low {
        tracing::warn!(stock_item_id = id, quantity = resulting, threshold = item.alert_threshold, "Stock below threshold");
        state.publish(
            PlatformEvent::new(EVT_STOCK_LOW)
                .with_source(ENTITY_STOCK_ITEM, id)
                .with_actor(scope.user_id())
                .with_tenant(tenant_id)
                .with_payload(serde_json::json!({
                    "name": item.name,
                    "quantity": item.quantity,
                    "threshold": item.alert_threshold,
                    "unit": item.unit,
                })),
        );
    }

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(MovementResult {
            movement,
            item,
            low_stock: is_low,
        })),
    ))
}

/// GET /api/restauration/stock/{id}/movements
pub async fn list_movements(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<StockMovement>>>> {
    scope.require(&state.pool, PERM_RESTAURATION_READ).await?;
    find_item_in_scope(&state, &scope, id).await?;
    let (limit, offset) = params.page();
    let rows = StockRepo::movements(&state.pool, id, limit, offset).await?;
    Ok(Json(DataResponse::new(rows)))
}

/// Load a stock item and return it with its owning tenant id.
async fn find_item_in_scope(
    state: &AppState,
    scope: &TenantScope,
    id: DbId,
) -> AppResult<(StockItem, DbId)> {
    let not_found = || AppError::Core(CoreError::NotFound { entity: "Stock item", id });
    let item = StockRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(not_found)?;
    let restaurant = RestaurantRepo::find_by_id(&state.pool, item.restaurant_id)
        .await?
        .ok_or_else(not_found)?;
    scope
        .ensure_owned(&state.pool, restaurant.tenant_id, "Stock item", id)
        .await?;
    Ok((item, restaurant.tenant_id))
}
