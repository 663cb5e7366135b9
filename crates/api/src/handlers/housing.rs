//! Handlers for rooms, beds and occupancies under `/housing`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use crou_core::error::CoreError;
use crou_core::housing::{self, BedStatus, OccupancyStatus, RoomGender};
use crou_core::roles::{PERM_HOUSING_READ, PERM_HOUSING_WRITE};
use crou_core::status::StatusEnum;
use crou_core::types::DbId;
use crou_db::models::housing::{Bed, CreateRoom, Occupancy, Room, UpdateRoom};
use crou_db::repositories::{OccupancyRepo, RoomRepo};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::scope::TenantScope;
use crate::query::parse_status_filter;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub tenant_id: Option<DbId>,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub residence: String,
    #[validate(length(min = 1, max = 20, message = "must be 1-20 characters"))]
    pub number: String,
    pub floor: Option<i32>,
    pub capacity: i32,
    /// `M`, `F` or `mixed`.
    pub gender: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoomRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub residence: Option<String>,
    pub floor: Option<i32>,
    pub capacity: Option<i32>,
    pub gender: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct BedStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListParams {
    pub tenant_id: Option<DbId>,
    pub residence: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyListParams {
    pub tenant_id: Option<DbId>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A room with its beds.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetail {
    #[serde(flatten)]
    pub room: Room,
    pub beds: Vec<Bed>,
}

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

/// POST /api/housing/rooms
///
/// Creates the room and `capacity` beds labelled A, B, C, ...
pub async fn create_room(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(input): Json<CreateRoomRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<RoomDetail>>)> {
    scope.require(&state.pool, PERM_HOUSING_WRITE).await?;
    input.validate()?;
    housing::validate_capacity(input.capacity)?;
    let gender = RoomGender::parse(&input.gender)?;
    let owner = scope.owner_tenant(&state.pool, input.tenant_id).await?;

    let labels = housing::bed_labels(0, input.capacity as usize);
    let create_dto = CreateRoom {
        tenant_id: owner.id,
        residence: input.residence.trim().to_string(),
        number: input.number.trim().to_string(),
        floor: input.floor,
        capacity: input.capacity,
        gender,
    };
    let (room, beds) = RoomRepo::create(&state.pool, &create_dto, &labels).await?;
    tracing::info!(
        room_id = room.id,
        tenant_id = owner.id,
        beds = beds.len(),
        actor = scope.user_id(),
        "Room created"
    );

    Ok((StatusCode::CREATED, Json(DataResponse::new(RoomDetail { room, beds }))))
}

/// GET /api/housing/rooms
pub async fn list_rooms(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(params): Query<RoomListParams>,
) -> AppResult<Json<DataResponse<Vec<Room>>>> {
    scope.require(&state.pool, PERM_HOUSING_READ).await?;
    let path = scope.list_path(&state.pool, params.tenant_id).await?;
    let (limit, offset) = crou_core::pagination::page(params.limit, params.offset);
    let rooms = RoomRepo::list(&state.pool, &path, params.residence.as_deref(), limit, offset).await?;
    Ok(Json(DataResponse::new(rooms)))
}

/// GET /api/housing/rooms/{id}
pub async fn get_room(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<RoomDetail>>> {
    scope.require(&state.pool, PERM_HOUSING_READ).await?;
    let room = find_room_in_scope(&state, &scope, id).await?;
    let beds = RoomRepo::beds(&state.pool, id).await?;
    Ok(Json(DataResponse::new(RoomDetail { room, beds })))
}

/// PUT /api/housing/rooms/{id}
///
/// Raising the capacity appends beds with the next free labels; lowering
/// it removes available beds from the end and is refused when that would
/// drop a bed that is occupied or in maintenance.
pub async fn update_room(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateRoomRequest>,
) -> AppResult<Json<DataResponse<RoomDetail>>> {
    scope.require(&state.pool, PERM_HOUSING_WRITE).await?;
    input.validate()?;
    let gender = input.gender.as_deref().map(RoomGender::parse).transpose()?;
    find_room_in_scope(&state, &scope, id).await?;

    let mut add_labels = Vec::new();
    let mut remove_count = 0_i64;
    if let Some(capacity) = input.capacity {
        housing::validate_capacity(capacity)?;
        let beds = RoomRepo::beds(&state.pool, id).await?;
        let current = beds.len() as i64;
        let wanted = i64::from(capacity);
        if wanted > current {
            let existing: Vec<String> = beds.into_iter().map(|b| b.label).collect();
            add_labels = housing::next_free_labels(&existing, (wanted - current) as usize);
        } else if wanted < current {
            let in_use = RoomRepo::count_beds_in_use(&state.pool, id).await?;
            housing::check_capacity_change(capacity, in_use)?;
            remove_count = current - wanted;
            let removable = RoomRepo::count_removable_beds(&state.pool, id).await?;
            if removable < remove_count {
                return Err(AppError::Core(CoreError::Conflict(format!(
                    "Cannot lower capacity to {capacity}: only {removable} bed(s) are free \
                     and without occupancy history"
                ))));
            }
        }
    }

    let update_dto = UpdateRoom {
        residence: input.residence.map(|r| r.trim().to_string()),
        floor: input.floor,
        capacity: input.capacity,
        gender,
        is_active: input.is_active,
    };
    let room = RoomRepo::update(&state.pool, id, &update_dto, &add_labels, remove_count)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Room", id }))?;
    let beds = RoomRepo::beds(&state.pool, id).await?;

    tracing::info!(
        room_id = id,
        capacity = room.capacity,
        added = add_labels.len(),
        removed = remove_count,
        actor = scope.user_id(),
        "Room updated"
    );
    Ok(Json(DataResponse::new(RoomDetail { room, beds })))
}

/// DELETE /api/housing/rooms/{id}
///
/// Only rooms whose beds are all available and have never been occupied
/// can be deleted. Rooms with occupancy history are kept for the record
/// and retired with `isActive: false` instead.
pub async fn delete_room(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    scope.require(&state.pool, PERM_HOUSING_WRITE).await?;
    find_room_in_scope(&state, &scope, id).await?;

    let in_use = RoomRepo::count_beds_in_use(&state.pool, id).await?;
    if in_use > 0 {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Room has {in_use} bed(s) occupied or in maintenance"
        ))));
    }
    if RoomRepo::has_occupancy_history(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::Conflict(
            "Room has occupancy history; deactivate it instead of deleting".into(),
        )));
    }
    if !RoomRepo::delete(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::NotFound { entity: "Room", id }));
    }
    tracing::info!(room_id = id, actor = scope.user_id(), "Room deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Beds
// ---------------------------------------------------------------------------

/// GET /api/housing/rooms/{id}/beds
pub async fn list_beds(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<Bed>>>> {
    scope.require(&state.pool, PERM_HOUSING_READ).await?;
    find_room_in_scope(&state, &scope, id).await?;
    let beds = RoomRepo::beds(&state.pool, id).await?;
    Ok(Json(DataResponse::new(beds)))
}

/// PUT /api/housing/beds/{id}/status
///
/// Toggle a bed between `available` and `maintenance`. Occupied beds are
/// released by ending their occupancy.
pub async fn set_bed_status(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Json(input): Json<BedStatusRequest>,
) -> AppResult<Json<DataResponse<Bed>>> {
    scope.require(&state.pool, PERM_HOUSING_WRITE).await?;
    let to = parse_status_filter::<BedStatus>(Some(&input.status))?
        .ok_or_else(|| AppError::Core(CoreError::Validation("status is required".into())))?;
    if !to.is_manually_settable() {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Bed status '{}' cannot be set by hand",
            to.as_str()
        ))));
    }

    let bed = RoomRepo::find_bed(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Bed", id }))?;
    let room = RoomRepo::find_by_id(&state.pool, bed.room_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Bed", id }))?;
    scope.ensure_owned(&state.pool, room.tenant_id, "Bed", id).await?;

    let from = BedStatus::try_from_id(bed.status_id)?;
    if from == BedStatus::Occupied {
        return Err(AppError::Core(CoreError::Conflict(
            "Bed is occupied; end the occupancy first".into(),
        )));
    }
    if from == to {
        return Ok(Json(DataResponse::new(bed)));
    }

    let updated = RoomRepo::set_bed_status(&state.pool, id, from, to)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Conflict(
                "Bed status changed concurrently; reload and retry".into(),
            ))
        })?;
    tracing::info!(
        bed_id = id,
        from = from.as_str(),
        to = to.as_str(),
        actor = scope.user_id(),
        "Bed status changed"
    );
    Ok(Json(DataResponse::new(updated)))
}

// ---------------------------------------------------------------------------
// Occupancies
// ---------------------------------------------------------------------------

/// GET /api/housing/occupancies
pub async fn list_occupancies(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(params): Query<OccupancyListParams>,
) -> AppResult<Json<DataResponse<Vec<Occupancy>>>> {
    scope.require(&state.pool, PERM_HOUSING_READ).await?;
    let status = parse_status_filter::<OccupancyStatus>(params.status.as_deref())?;
    let path = scope.list_path(&state.pool, params.tenant_id).await?;
    let (limit, offset) = crou_core::pagination::page(params.limit, params.offset);
    let rows = OccupancyRepo::list(&state.pool, &path, status, limit, offset).await?;
    Ok(Json(DataResponse::new(rows)))
}

/// POST /api/housing/occupancies/{id}/end
///
/// Ends the stay and frees the bed.
pub async fn end_occupancy(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Occupancy>>> {
    scope.require(&state.pool, PERM_HOUSING_WRITE).await?;
    let tenant_id = OccupancyRepo::tenant_of(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Occupancy", id }))?;
    scope.ensure_owned(&state.pool, tenant_id, "Occupancy", id).await?;

    let ended = OccupancyRepo::end(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Conflict("Occupancy has already ended".into())))?;
    tracing::info!(occupancy_id = id, bed_id = ended.bed_id, actor = scope.user_id(), "Occupancy ended");
    Ok(Json(DataResponse::new(ended)))
}

async fn find_room_in_scope(state: &AppState, scope: &TenantScope, id: DbId) -> AppResult<Room> {
    let room = RoomRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Room", id }))?;
    scope.ensure_owned(&state.pool, room.tenant_id, "Room", id).await?;
    Ok(room)
}
