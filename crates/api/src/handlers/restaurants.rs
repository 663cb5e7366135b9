//! Handlers for restaurants, their menus and meal services.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use crou_core::error::CoreError;
use crou_core::restauration::{MealStatus, MealType};
use crou_core::roles::{PERM_RESTAURATION_READ, PERM_RESTAURATION_WRITE};
use crou_core::status::{ensure_transition, StatusEnum};
use crou_core::types::{Amount, DbId};
use crou_db::models::restauration::{
    CreateMeal, CreateMenu, CreateRestaurant, Meal, Menu, Restaurant, UpdateMenu, UpdateRestaurant,
};
use crou_db::repositories::{MealRepo, RestaurantRepo};
use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::scope::TenantScope;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRestaurantRequest {
    pub tenant_id: Option<DbId>,
    #[validate(length(min = 2, max = 20, message = "must be 2-20 characters"))]
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: String,
    pub location: Option<String>,
    #[validate(range(min = 1, message = "must be positive"))]
    pub capacity: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRestaurantRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: Option<String>,
    pub location: Option<String>,
    #[validate(range(min = 1, message = "must be positive"))]
    pub capacity: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantListParams {
    pub tenant_id: Option<DbId>,
    #[serde(default)]
    pub include_inactive: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMenuRequest {
    pub menu_date: NaiveDate,
    pub meal_type: String,
    #[validate(length(min = 1, max = 1000, message = "must be 1-1000 characters"))]
    pub description: String,
    #[validate(range(min = 0, message = "cannot be negative"))]
    pub price: Amount,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMenuRequest {
    #[validate(length(min = 1, max = 1000, message = "must be 1-1000 characters"))]
    pub description: Option<String>,
    #[validate(range(min = 0, message = "cannot be negative"))]
    pub price: Option<Amount>,
}

#[derive(Debug, Deserialize)]
pub struct MenuListParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMealRequest {
    pub menu_id: Option<DbId>,
    pub service_date: NaiveDate,
    pub meal_type: String,
    #[validate(range(min = 0, message = "cannot be negative"))]
    pub expected_count: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct MealListParams {
    pub date: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ---------------------------------------------------------------------------
// Restaurants
// ---------------------------------------------------------------------------

/// POST /api/restauration/restaurants
pub async fn create_restaurant(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(input): Json<CreateRestaurantRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Restaurant>>)> {
    scope.require(&state.pool, PERM_RESTAURATION_WRITE).await?;
    input.validate()?;
    let owner = scope.owner_tenant(&state.pool, input.tenant_id).await?;

    let create_dto = CreateRestaurant {
        tenant_id: owner.id,
        code: input.code.trim().to_uppercase(),
        name: input.name,
        location: input.location,
        capacity: input.capacity,
    };
    let created = RestaurantRepo::create(&state.pool, &create_dto).await?;
    tracing::info!(restaurant_id = created.id, tenant_id = owner.id, actor = scope.user_id(), "Restaurant created");
    Ok((StatusCode::CREATED, Json(DataResponse::new(created))))
}

/// GET /api/restauration/restaurants
pub async fn list_restaurants(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(params): Query<RestaurantListParams>,
) -> AppResult<Json<DataResponse<Vec<Restaurant>>>> {
    scope.require(&state.pool, PERM_RESTAURATION_READ).await?;
    let path = scope.list_path(&state.pool, params.tenant_id).await?;
    let (limit, offset) = crou_core::pagination::page(params.limit, params.offset);
    let rows =
        RestaurantRepo::list(&state.pool, &path, params.include_inactive, limit, offset).await?;
    Ok(Json(DataResponse::new(rows)))
}

/// GET /api/restauration/restaurants/{id}
pub async fn get_restaurant(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Restaurant>>> {
    scope.require(&state.pool, PERM_RESTAURATION_READ).await?;
    let found = find_restaurant_in_scope(&state, &scope, id).await?;
    Ok(Json(DataResponse::new(found)))
}

/// PUT /api/restauration/restaurants/{id}
pub async fn update_restaurant(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateRestaurantRequest>,
) -> AppResult<Json<DataResponse<Restaurant>>> {
    scope.require(&state.pool, PERM_RESTAURATION_WRITE).await?;
    input.validate()?;
    find_restaurant_in_scope(&state, &scope, id).await?;

    let update_dto = UpdateRestaurant {
        name: input.name,
        location: input.location,
        capacity: input.capacity,
        is_active: input.is_active,
    };
    let updated = RestaurantRepo::update(&state.pool, id, &update_dto)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Restaurant", id }))?;
    tracing::info!(restaurant_id = id, actor = scope.user_id(), "Restaurant updated");
    Ok(Json(DataResponse::new(updated)))
}

/// DELETE /api/restauration/restaurants/{id}
///
/// Soft-deactivate. Returns 204 No Content.
pub async fn deactivate_restaurant(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    scope.require(&state.pool, PERM_RESTAURATION_WRITE).await?;
    find_restaurant_in_scope(&state, &scope, id).await?;
    if !RestaurantRepo::deactivate(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::Conflict(
            "Restaurant is already inactive".into(),
        )));
    }
    tracing::info!(restaurant_id = id, actor = scope.user_id(), "Restaurant deactivated");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Menus
// ---------------------------------------------------------------------------

/// POST /api/restauration/restaurants/{id}/menus
pub async fn create_menu(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(restaurant_id): Path<DbId>,
    Json(input): Json<CreateMenuRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Menu>>)> {
    scope.require(&state.pool, PERM_RESTAURATION_WRITE).await?;
    input.validate()?;
    let meal_type = MealType::parse(&input.meal_type)?;
    find_restaurant_in_scope(&state, &scope, restaurant_id).await?;

    let create_dto = CreateMenu {
        restaurant_id,
        menu_date: input.menu_date,
        meal_type,
        description: input.description,
        price: input.price,
    };
    let created = RestaurantRepo::create_menu(&state.pool, &create_dto).await?;
    tracing::info!(menu_id = created.id, restaurant_id, actor = scope.user_id(), "Menu created");
    Ok((StatusCode::CREATED, Json(DataResponse::new(created))))
}

/// GET /api/restauration/restaurants/{id}/menus?from=&to=
pub async fn list_menus(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(restaurant_id): Path<DbId>,
    Query(params): Query<MenuListParams>,
) -> AppResult<Json<DataResponse<Vec<Menu>>>> {
    scope.require(&state.pool, PERM_RESTAURATION_READ).await?;
    find_restaurant_in_scope(&state, &scope, restaurant_id).await?;
    let menus = RestaurantRepo::list_menus(&state.pool, restaurant_id, params.from, params.to).await?;
    Ok(Json(DataResponse::new(menus)))
}

/// PUT /api/restauration/menus/{id}
pub async fn update_menu(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateMenuRequest>,
) -> AppResult<Json<DataResponse<Menu>>> {
    scope.require(&state.pool, PERM_RESTAURATION_WRITE).await?;
    input.validate()?;
    find_menu_in_scope(&state, &scope, id).await?;

    let update_dto = UpdateMenu {
        description: input.description,
        price: input.price,
    };
    let updated = RestaurantRepo::update_menu(&state.pool, id, &update_dto)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Menu", id }))?;
    Ok(Json(DataResponse::new(updated)))
}

/// DELETE /api/restauration/menus/{id}
pub async fn delete_menu(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    scope.require(&state.pool, PERM_RESTAURATION_WRITE).await?;
    find_menu_in_scope(&state, &scope, id).await?;
    if !RestaurantRepo::delete_menu(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::NotFound { entity: "Menu", id }));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Meals
// ---------------------------------------------------------------------------

/// POST /api/restauration/restaurants/{id}/meals
pub async fn create_meal(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(restaurant_id): Path<DbId>,
    Json(input): Json<CreateMealRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Meal>>)> {
    scope.require(&state.pool, PERM_RESTAURATION_WRITE).await?;
    input.validate()?;
    let meal_type = MealType::parse(&input.meal_type)?;
    let restaurant = find_restaurant_in_scope(&state, &scope, restaurant_id).await?;
    if !restaurant.is_active {
        return Err(AppError::Core(CoreError::Conflict(
            "Restaurant is deactivated".into(),
        )));
    }

    if let Some(menu_id) = input.menu_id {
        let menu = RestaurantRepo::find_menu(&state.pool, menu_id)
            .await?
            .filter(|m| m.restaurant_id == restaurant_id)
            .ok_or_else(|| {
                AppError::Core(CoreError::Validation(format!(
                    "Menu {menu_id} does not belong to restaurant {restaurant_id}"
                )))
            })?;
        if menu.menu_date != input.service_date || menu.meal_type != meal_type.as_str() {
            return Err(AppError::Core(CoreError::Validation(
                "Menu date and meal type must match the service".into(),
            )));
        }
    }

    let create_dto = CreateMeal {
        restaurant_id,
        menu_id: input.menu_id,
        service_date: input.service_date,
        meal_type,
        expected_count: input.expected_count,
    };
    let created = MealRepo::create(&state.pool, &create_dto).await?;
    tracing::info!(meal_id = created.id, restaurant_id, actor = scope.user_id(), "Meal planned");
    Ok((StatusCode::CREATED, Json(DataResponse::new(created))))
}

/// GET /api/restauration/restaurants/{id}/meals?date=
pub async fn list_meals(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(restaurant_id): Path<DbId>,
    Query(params): Query<MealListParams>,
) -> AppResult<Json<DataResponse<Vec<Meal>>>> {
    scope.require(&state.pool, PERM_RESTAURATION_READ).await?;
    find_restaurant_in_scope(&state, &scope, restaurant_id).await?;
    let (limit, offset) = crou_core::pagination::page(params.limit, params.offset);
    let meals = MealRepo::list(&state.pool, restaurant_id, params.date, limit, offset).await?;
    Ok(Json(DataResponse::new(meals)))
}

/// POST /api/restauration/meals/{id}/start
pub async fn start_meal(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Meal>>> {
    scope.require(&state.pool, PERM_RESTAURATION_WRITE).await?;
    let updated = transition_meal(&state, &scope, id, MealStatus::Serving).await?;
    Ok(Json(DataResponse::new(updated)))
}

/// POST /api/restauration/meals/{id}/close
pub async fn close_meal(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Meal>>> {
    scope.require(&state.pool, PERM_RESTAURATION_WRITE).await?;
    let updated = transition_meal(&state, &scope, id, MealStatus::Closed).await?;
    Ok(Json(DataResponse::new(updated)))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) async fn find_restaurant_in_scope(
    state: &AppState,
    scope: &TenantScope,
    id: DbId,
) -> AppResult<Restaurant> {
    let found = RestaurantRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Restaurant", id }))?;
    scope.ensure_owned(&state.pool, found.tenant_id, "Restaurant", id).await?;
    Ok(found)
}

async fn find_menu_in_scope(state: &AppState, scope: &TenantScope, id: DbId) -> AppResult<Menu> {
    let menu = RestaurantRepo::find_menu(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Menu", id }))?;
    let owner = RestaurantRepo::find_by_id(&state.pool, menu.restaurant_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Menu", id }))?;
    scope.ensure_owned(&state.pool, owner.tenant_id, "Menu", id).await?;
    Ok(menu)
}

/// Load a meal and the restaurant serving it, checking scope.
pub(crate) async fn find_meal_in_scope(
    state: &AppState,
    scope: &TenantScope,
    id: DbId,
) -> AppResult<(Meal, Restaurant)> {
    let meal = MealRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Meal", id }))?;
    let restaurant = RestaurantRepo::find_by_id(&state.pool, meal.restaurant_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Meal", id }))?;
    scope.ensure_owned(&state.pool, restaurant.tenant_id, "Meal", id).await?;
    Ok((meal, restaurant))
}

async fn transition_meal(
    state: &AppState,
    scope: &TenantScope,
    id: DbId,
    to: MealStatus,
) -> AppResult<Meal> {
    let (meal, _) = find_meal_in_scope(state, scope, id).await?;
    let from = meal.status()?;
    ensure_transition(from, to)?;
    let updated = MealRepo::transition(&state.pool, id, from, to)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Conflict(
                "Meal status changed concurrently; reload and retry".into(),
            ))
        })?;
    tracing::info!(
        meal_id = id,
        from = from.as_str(),
        to = to.as_str(),
        served = updated.served_count,
        actor = scope.user_id(),
        "Meal status changed"
    );
    Ok(updated)
}
