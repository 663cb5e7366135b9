//! Handlers for meal tickets: batch issue, lookup, cancellation and
//! scanning at a meal service.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use crou_core::error::CoreError;
use crou_core::event_types::EVT_TICKETS_GENERATED;
use crou_core::restauration::{self, MealType, TicketStatus};
use crou_core::roles::{PERM_RESTAURATION_READ, PERM_RESTAURATION_WRITE, PERM_TICKETS_SCAN};
use crou_core::tenant;
use crou_core::types::{Amount, DbId};
use crou_db::models::restauration::{MealTicket, NewTicket, TicketBatch};
use crou_db::repositories::{MealRepo, TenantRepo, TicketRepo};
use crou_events::PlatformEvent;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::restaurants::find_meal_in_scope;
use crate::error::{AppError, AppResult};
use crate::middleware::scope::TenantScope;
use crate::query::parse_status_filter;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTicketsRequest {
    pub tenant_id: Option<DbId>,
    pub count: i64,
    /// Restrict the tickets to one meal type; any meal when absent.
    pub meal_type: Option<String>,
    #[validate(range(min = 0, message = "cannot be negative"))]
    pub price: Amount,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedBatch {
    pub batch_ref: String,
    pub count: usize,
    pub tickets: Vec<MealTicket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketListParams {
    pub tenant_id: Option<DbId>,
    pub status: Option<String>,
    pub batch_ref: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    /// Printed ticket number or QR payload.
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub ticket: MealTicket,
    pub meal_id: DbId,
    pub served_count: i32,
}

/// POST /api/restauration/tickets/batch
///
/// Issues `count` (1..=5000) tickets numbered from the tenant's daily
/// sequence. Numbers are reserved and rows inserted in one transaction.
pub async fn generate_batch(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(input): Json<GenerateTicketsRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<GeneratedBatch>>)> {
    scope.require(&state.pool, PERM_RESTAURATION_WRITE).await?;
    input.validate()?;
    restauration::validate_batch_size(input.count)?;
    let meal_type = input.meal_type.as_deref().map(MealType::parse).transpose()?;
    if input.valid_until < input.valid_from {
        return Err(AppError::Core(CoreError::Validation(
            "validUntil must not be before validFrom".into(),
        )));
    }
    let owner = scope.owner_tenant(&state.pool, input.tenant_id).await?;

    let issue_date = Utc::now().date_naive();
    let batch_ref = format!(
        "B{}-{}",
        issue_date.format("%Y%m%d"),
        &uuid::Uuid::new_v4().simple().to_string()[..8]
    );

    let mut tx = state.pool.begin().await?;
    let first = TicketRepo::reserve_sequence(&mut tx, owner.id, issue_date, input.count).await?;
    let new_tickets: Vec<NewTicket> = (first..first + input.count)
        .map(|seq| {
            let number = restauration::ticket_number(&owner.code, issue_date, seq);
            let qr = restauration::qr_code(&state.config.ticket_qr_secret, &number);
            NewTicket {
                ticket_number: number,
                qr_code: qr,
            }
        })
        .collect();
    let batch = TicketBatch {
        tenant_id: owner.id,
        meal_type,
        price: input.price,
        valid_from: input.valid_from,
        valid_until: input.valid_until,
        batch_ref: batch_ref.clone(),
        created_by: Some(scope.user_id()),
    };
    let tickets = TicketRepo::insert_batch(&mut tx, &batch, &new_tickets).await?;
    tx.commit().await?;

    tracing::info!(
        tenant_id = owner.id,
        batch_ref = %batch_ref,
        count = tickets.len(),
        actor = scope.user_id(),
        "Ticket batch generated"
    );
    state.publish(
        PlatformEvent::new(EVT_TICKETS_GENERATED)
            .with_actor(scope.user_id())
            .with_tenant(owner.id)
            .with_payload(serde_json::json!({
                "batchRef": batch_ref,
                "count": tickets.len(),
                "mealType": meal_type.map(MealType::as_str),
            })),
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(GeneratedBatch {
            batch_ref,
            count: tickets.len(),
            tickets,
        })),
    ))
}

/// GET /api/restauration/tickets
pub async fn list_tickets(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(params): Query<TicketListParams>,
) -> AppResult<Json<DataResponse<Vec<MealTicket>>>> {
    scope.require(&state.pool, PERM_RESTAURATION_READ).await?;
    let status = parse_status_filter::<TicketStatus>(params.status.as_deref())?;
    let path = scope.list_path(&state.pool, params.tenant_id).await?;
    let (limit, offset) = crou_core::pagination::page(params.limit, params.offset);
    let rows = TicketRepo::list(
        &state.pool,
        &path,
        status,
        params.batch_ref.as_deref(),
        limit,
        offset,
    )
    .await?;
    Ok(Json(DataResponse::new(rows)))
}

/// GET /api/restauration/tickets/{number}
///
/// Accepts the printed number or the QR payload.
pub async fn get_ticket(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(code): Path<String>,
) -> AppResult<Json<DataResponse<MealTicket>>> {
    scope.require(&state.pool, PERM_RESTAURATION_READ).await?;
    let ticket = find_ticket_in_scope(&state, &scope, &code).await?;
    Ok(Json(DataResponse::new(ticket)))
}

/// POST /api/restauration/tickets/{number}/cancel
pub async fn cancel_ticket(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(code): Path<String>,
) -> AppResult<Json<DataResponse<MealTicket>>> {
    scope.require(&state.pool, PERM_RESTAURATION_WRITE).await?;
    let ticket = find_ticket_in_scope(&state, &scope, &code).await?;
    let cancelled = TicketRepo::cancel(&state.pool, ticket.id).await?.ok_or_else(|| {
        AppError::Core(CoreError::Conflict(
            "Only active tickets can be cancelled".into(),
        ))
    })?;
    tracing::info!(ticket_id = ticket.id, actor = scope.user_id(), "Ticket cancelled");
    Ok(Json(DataResponse::new(cancelled)))
}

/// POST /api/restauration/meals/{id}/tickets
///
/// Consumes a ticket at a meal that is being served. The ticket must have
/// been issued by the restaurant's tenant or one of its ancestors. A ticket
/// is consumed at most once, even under concurrent scans.
pub async fn scan_ticket(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(meal_id): Path<DbId>,
    Json(input): Json<ScanRequest>,
) -> AppResult<Json<DataResponse<ScanResult>>> {
    scope.require(&state.pool, PERM_TICKETS_SCAN).await?;
    let (meal, restaurant) = find_meal_in_scope(&state, &scope, meal_id).await?;
    restauration::ensure_meal_serving(meal.status()?)?;

    let code = input.code.trim();
    let ticket = TicketRepo::find_by_code(&state.pool, code)
        .await?
        .ok_or_else(ticket_not_found)?;

    let issuer = TenantRepo::find_by_id(&state.pool, ticket.tenant_id)
        .await?
        .ok_or_else(ticket_not_found)?;
    let venue = TenantRepo::find_by_id(&state.pool, restaurant.tenant_id)
        .await?
        .ok_or_else(ticket_not_found)?;
    if !tenant::is_within(&issuer.path, &venue.path) {
        return Err(AppError::Core(CoreError::Conflict(
            "Ticket was not issued for this restaurant".into(),
        )));
    }

    let today = Utc::now().date_naive();
    if today < ticket.valid_from {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Ticket is not valid before {}",
            ticket.valid_from
        ))));
    }
    restauration::check_ticket_usable(
        ticket.status()?,
        ticket.valid_until,
        today,
        ticket.meal()?,
        meal.meal()?,
    )?;

    let mut tx = state.pool.begin().await?;
    let used = TicketRepo::consume(&mut tx, ticket.id, meal_id, today)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Conflict("Ticket has already been used".into()))
        })?;
    let served_count = MealRepo::increment_served(&mut tx, meal_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Conflict("Meal is no longer being served".into()))
        })?;
    tx.commit().await?;

    tracing::info!(
        ticket_id = used.id,
        meal_id,
        restaurant_id = restaurant.id,
        actor = scope.user_id(),
        "Ticket scanned"
    );
    Ok(Json(DataResponse::new(ScanResult {
        ticket: used,
        meal_id,
        served_count,
    })))
}

async fn find_ticket_in_scope(
    state: &AppState,
    scope: &TenantScope,
    code: &str,
) -> AppResult<MealTicket> {
    let ticket = TicketRepo::find_by_code(&state.pool, code)
        .await?
        .ok_or_else(ticket_not_found)?;
    scope
        .ensure_owned(&state.pool, ticket.tenant_id, "Ticket", ticket.id)
        .await?;
    Ok(ticket)
}

/// Tickets are addressed by number, not id; a miss is a plain 404.
fn ticket_not_found() -> AppError {
    AppError::Database(sqlx::Error::RowNotFound)
}
