//! Handlers for the transport fleet: vehicles, drivers and routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, NaiveTime, Utc};
use crou_core::error::CoreError;
use crou_core::roles::{PERM_TRANSPORT_READ, PERM_TRANSPORT_WRITE};
use crou_core::status::{ensure_transition, StatusEnum};
use crou_core::transport::{self, VehicleStatus};
use crou_core::types::DbId;
use crou_db::models::transport::{
    CreateDriver, CreateRoute, CreateVehicle, Driver, TransportRoute, UpdateDriver, UpdateRoute,
    UpdateVehicle, Vehicle,
};
use crou_db::repositories::{DriverRepo, RouteRepo, VehicleRepo};
use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::scope::TenantScope;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetListParams {
    pub tenant_id: Option<DbId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateVehicleRequest {
    pub tenant_id: Option<DbId>,
    pub plate_number: String,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub brand: Option<String>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub model: Option<String>,
    pub capacity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateVehicleRequest {
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub brand: Option<String>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub model: Option<String>,
    pub capacity: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct VehicleStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDriverRequest {
    pub tenant_id: Option<DbId>,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub full_name: String,
    #[validate(length(min = 3, max = 50, message = "must be 3-50 characters"))]
    pub license_number: String,
    pub license_expires_on: NaiveDate,
    #[validate(length(max = 30, message = "must be at most 30 characters"))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDriverRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub full_name: Option<String>,
    pub license_expires_on: Option<NaiveDate>,
    #[validate(length(max = 30, message = "must be at most 30 characters"))]
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRouteRequest {
    pub tenant_id: Option<DbId>,
    #[validate(length(min = 1, max = 20, message = "must be 1-20 characters"))]
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub origin: String,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub destination: String,
    pub departure_time: Option<NaiveTime>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRouteRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub origin: Option<String>,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub destination: Option<String>,
    pub departure_time: Option<NaiveTime>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRouteRequest {
    pub vehicle_id: Option<DbId>,
    pub driver_id: Option<DbId>,
}

// ---------------------------------------------------------------------------
// Vehicles
// ---------------------------------------------------------------------------

/// POST /api/transport/vehicles
pub async fn create_vehicle(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(input): Json<CreateVehicleRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Vehicle>>)> {
    scope.require(&state.pool, PERM_TRANSPORT_WRITE).await?;
    input.validate()?;
    let plate_number = transport::validate_plate_number(&input.plate_number)?;
    transport::validate_seat_capacity(input.capacity)?;
    let owner = scope.owner_tenant(&state.pool, input.tenant_id).await?;

    let create_dto = CreateVehicle {
        tenant_id: owner.id,
        plate_number,
        brand: input.brand,
        model: input.model,
        capacity: input.capacity,
    };
    let created = VehicleRepo::create(&state.pool, &create_dto).await?;
    tracing::info!(vehicle_id = created.id, plate = %created.plate_number, actor = scope.user_id(), "Vehicle registered");
    Ok((StatusCode::CREATED, Json(DataResponse::new(created))))
}

/// GET /api/transport/vehicles
pub async fn list_vehicles(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(params): Query<FleetListParams>,
) -> AppResult<Json<DataResponse<Vec<Vehicle>>>> {
    scope.require(&state.pool, PERM_TRANSPORT_READ).await?;
    let path = scope.list_path(&state.pool, params.tenant_id).await?;
    let (limit, offset) = crou_core::pagination::page(params.limit, params.offset);
    let rows = VehicleRepo::list(&state.pool, &path, limit, offset).await?;
    Ok(Json(DataResponse::new(rows)))
}

/// GET /api/transport/vehicles/{id}
pub async fn get_vehicle(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vehicle>>> {
    scope.require(&state.pool, PERM_TRANSPORT_READ).await?;
    let vehicle = find_vehicle_in_scope(&state, &scope, id).await?;
    Ok(Json(DataResponse::new(vehicle)))
}

/// PUT /api/transport/vehicles/{id}
pub async fn update_vehicle(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateVehicleRequest>,
) -> AppResult<Json<DataResponse<Vehicle>>> {
    scope.require(&state.pool, PERM_TRANSPORT_WRITE).await?;
    input.validate()?;
    if let Some(capacity) = input.capacity {
        transport::validate_seat_capacity(capacity)?;
    }
    find_vehicle_in_scope(&state, &scope, id).await?;

    let update_dto = UpdateVehicle {
        brand: input.brand,
        model: input.model,
        capacity: input.capacity,
    };
    let updated = VehicleRepo::update(&state.pool, id, &update_dto)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Vehicle", id }))?;
    tracing::info!(vehicle_id = id, actor = scope.user_id(), "Vehicle updated");
    Ok(Json(DataResponse::new(updated)))
}

/// PUT /api/transport/vehicles/{id}/status
pub async fn set_vehicle_status(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Json(input): Json<VehicleStatusRequest>,
) -> AppResult<Json<DataResponse<Vehicle>>> {
    scope.require(&state.pool, PERM_TRANSPORT_WRITE).await?;
    let to = VehicleStatus::parse(&input.status).ok_or_else(|| {
        AppError::Core(CoreError::Validation(format!(
            "Unknown vehicle status '{}'",
            input.status
        )))
    })?;
    if to == VehicleStatus::Retired {
        return Err(AppError::BadRequest(
            "Use DELETE /api/transport/vehicles/{id} to retire a vehicle".into(),
        ));
    }
    let vehicle = find_vehicle_in_scope(&state, &scope, id).await?;
    let from = vehicle.status()?;
    ensure_transition(from, to)?;

    let updated = VehicleRepo::set_status(&state.pool, id, from, to)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Conflict(
                "Vehicle status changed concurrently; reload and retry".into(),
            ))
        })?;
    tracing::info!(
        vehicle_id = id,
        from = from.as_str(),
        to = to.as_str(),
        actor = scope.user_id(),
        "Vehicle status changed"
    );
    Ok(Json(DataResponse::new(updated)))
}

/// DELETE /api/transport/vehicles/{id}
///
/// Retires the vehicle and detaches it from its routes. Returns 204 No Content.
pub async fn retire_vehicle(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    scope.require(&state.pool, PERM_TRANSPORT_WRITE).await?;
    find_vehicle_in_scope(&state, &scope, id).await?;
    if !VehicleRepo::retire(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::Conflict(
            "Vehicle is already retired".into(),
        )));
    }
    tracing::info!(vehicle_id = id, actor = scope.user_id(), "Vehicle retired");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Drivers
// ---------------------------------------------------------------------------

/// POST /api/transport/drivers
pub async fn create_driver(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(input): Json<CreateDriverRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Driver>>)> {
    scope.require(&state.pool, PERM_TRANSPORT_WRITE).await?;
    input.validate()?;
    let owner = scope.owner_tenant(&state.pool, input.tenant_id).await?;

    let create_dto = CreateDriver {
        tenant_id: owner.id,
        full_name: input.full_name,
        license_number: input.license_number.trim().to_uppercase(),
        license_expires_on: input.license_expires_on,
        phone: input.phone,
    };
    let created = DriverRepo::create(&state.pool, &create_dto).await?;
    tracing::info!(driver_id = created.id, tenant_id = owner.id, actor = scope.user_id(), "Driver registered");
    Ok((StatusCode::CREATED, Json(DataResponse::new(created))))
}

/// GET /api/transport/drivers
pub async fn list_drivers(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(params): Query<FleetListParams>,
) -> AppResult<Json<DataResponse<Vec<Driver>>>> {
    scope.require(&state.pool, PERM_TRANSPORT_READ).await?;
    let path = scope.list_path(&state.pool, params.tenant_id).await?;
    let (limit, offset) = crou_core::pagination::page(params.limit, params.offset);
    let rows = DriverRepo::list(&state.pool, &path, limit, offset).await?;
    Ok(Json(DataResponse::new(rows)))
}

/// GET /api/transport/drivers/{id}
pub async fn get_driver(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Driver>>> {
    scope.require(&state.pool, PERM_TRANSPORT_READ).await?;
    let driver = find_driver_in_scope(&state, &scope, id).await?;
    Ok(Json(DataResponse::new(driver)))
}

/// PUT /api/transport/drivers/{id}
pub async fn update_driver(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateDriverRequest>,
) -> AppResult<Json<DataResponse<Driver>>> {
    scope.require(&state.pool, PERM_TRANSPORT_WRITE).await?;
    input.validate()?;
    find_driver_in_scope(&state, &scope, id).await?;

    let update_dto = UpdateDriver {
        full_name: input.full_name,
        license_expires_on: input.license_expires_on,
        phone: input.phone,
        is_active: input.is_active,
    };
    let updated = DriverRepo::update(&state.pool, id, &update_dto)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Driver", id }))?;
    tracing::info!(driver_id = id, actor = scope.user_id(), "Driver updated");
    Ok(Json(DataResponse::new(updated)))
}

/// DELETE /api/transport/drivers/{id}
///
/// Deactivates the driver and clears their route assignments.
pub async fn deactivate_driver(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    scope.require(&state.pool, PERM_TRANSPORT_WRITE).await?;
    find_driver_in_scope(&state, &scope, id).await?;
    if !DriverRepo::deactivate(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::Conflict(
            "Driver is already inactive".into(),
        )));
    }
    tracing::info!(driver_id = id, actor = scope.user_id(), "Driver deactivated");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// POST /api/transport/routes
pub async fn create_route(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(input): Json<CreateRouteRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<TransportRoute>>)> {
    scope.require(&state.pool, PERM_TRANSPORT_WRITE).await?;
    input.validate()?;
    let owner = scope.owner_tenant(&state.pool, input.tenant_id).await?;

    let create_dto = CreateRoute {
        tenant_id: owner.id,
        code: input.code.trim().to_uppercase(),
        name: input.name,
        origin: input.origin,
        destination: input.destination,
        departure_time: input.departure_time,
    };
    let created = RouteRepo::create(&state.pool, &create_dto).await?;
    tracing::info!(route_id = created.id, code = %created.code, actor = scope.user_id(), "Route created");
    Ok((StatusCode::CREATED, Json(DataResponse::new(created))))
}

/// GET /api/transport/routes
pub async fn list_routes(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(params): Query<FleetListParams>,
) -> AppResult<Json<DataResponse<Vec<TransportRoute>>>> {
    scope.require(&state.pool, PERM_TRANSPORT_READ).await?;
    let path = scope.list_path(&state.pool, params.tenant_id).await?;
    let (limit, offset) = crou_core::pagination::page(params.limit, params.offset);
    let rows = RouteRepo::list(&state.pool, &path, limit, offset).await?;
    Ok(Json(DataResponse::new(rows)))
}

/// GET /api/transport/routes/{id}
pub async fn get_route(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<TransportRoute>>> {
    scope.require(&state.pool, PERM_TRANSPORT_READ).await?;
    let route = find_route_in_scope(&state, &scope, id).await?;
    Ok(Json(DataResponse::new(route)))
}

/// PUT /api/transport/routes/{id}
pub async fn update_route(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateRouteRequest>,
) -> AppResult<Json<DataResponse<TransportRoute>>> {
    scope.require(&state.pool, PERM_TRANSPORT_WRITE).await?;
    input.validate()?;
    find_route_in_scope(&state, &scope, id).await?;

    let update_dto = UpdateRoute {
        name: input.name,
        origin: input.origin,
        destination: input.destination,
        departure_time: input.departure_time,
        is_active: input.is_active,
    };
    let updated = RouteRepo::update(&state.pool, id, &update_dto)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Route", id }))?;
    tracing::info!(route_id = id, actor = scope.user_id(), "Route updated");
    Ok(Json(DataResponse::new(updated)))
}

/// DELETE /api/transport/routes/{id}
pub async fn delete_route(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    scope.require(&state.pool, PERM_TRANSPORT_WRITE).await?;
    find_route_in_scope(&state, &scope, id).await?;
    if !RouteRepo::delete(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::NotFound { entity: "Route", id }));
    }
    tracing::info!(route_id = id, actor = scope.user_id(), "Route deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/transport/routes/{id}/assign
///
/// Sets the vehicle and/or driver of a route. The vehicle must be
/// available or in service; the driver must be active with a valid
/// license. Both must be visible to the caller.
pub async fn assign_route(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Json(input): Json<AssignRouteRequest>,
) -> AppResult<Json<DataResponse<TransportRoute>>> {
    scope.require(&state.pool, PERM_TRANSPORT_WRITE).await?;
    if input.vehicle_id.is_none() && input.driver_id.is_none() {
        return Err(AppError::BadRequest(
            "At least one of vehicleId or driverId is required".into(),
        ));
    }
    let route = find_route_in_scope(&state, &scope, id).await?;
    if !route.is_active {
        return Err(AppError::Core(CoreError::Conflict(
            "Cannot assign resources to an inactive route".into(),
        )));
    }

    if let Some(vehicle_id) = input.vehicle_id {
        let vehicle = find_vehicle_in_scope(&state, &scope, vehicle_id).await?;
        transport::ensure_vehicle_assignable(vehicle.status()?)?;
    }
    if let Some(driver_id) = input.driver_id {
        let driver = find_driver_in_scope(&state, &scope, driver_id).await?;
        if !driver.is_active {
            return Err(AppError::Core(CoreError::Conflict(format!(
                "Driver {driver_id} is inactive"
            ))));
        }
        transport::ensure_license_valid(driver.license_expires_on, Utc::now().date_naive())?;
    }

    let updated = RouteRepo::assign(&state.pool, id, input.vehicle_id, input.driver_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Route", id }))?;
    tracing::info!(
        route_id = id,
        vehicle_id = ?updated.vehicle_id,
        driver_id = ?updated.driver_id,
        actor = scope.user_id(),
        "Route assignment updated"
    );
    Ok(Json(DataResponse::new(updated)))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_vehicle_in_scope(state: &AppState, scope: &TenantScope, id: DbId) -> AppResult<Vehicle> {
    let vehicle = VehicleRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Vehicle", id }))?;
    scope.ensure_owned(&state.pool, vehicle.tenant_id, "Vehicle", id).await?;
    Ok(vehicle)
}

async fn find_driver_in_scope(state: &AppState, scope: &TenantScope, id: DbId) -> AppResult<Driver> {
    let driver = DriverRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Driver", id }))?;
    scope.ensure_owned(&state.pool, driver.tenant_id, "Driver", id).await?;
    Ok(driver)
}

async fn find_route_in_scope(
    state: &AppState,
    scope: &TenantScope,
    id: DbId,
) -> AppResult<TransportRoute> {
    let route = RouteRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Route", id }))?;
    scope.ensure_owned(&state.pool, route.tenant_id, "Route", id).await?;
    Ok(route)
}
