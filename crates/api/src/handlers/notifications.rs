//! Handlers for the `/notifications` resource.
//!
//! Every endpoint acts on the authenticated user's own inbox.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use crou_core::error::CoreError;
use crou_core::types::DbId;
use crou_db::models::notification::Notification;
use crou_db::repositories::NotificationRepo;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAuth;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for `GET /notifications`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    /// Only unread notifications. Defaults to `false`.
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedRead {
    pub marked_read: u64,
}

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(params): Query<NotificationQuery>,
) -> AppResult<Json<DataResponse<Vec<Notification>>>> {
    let (limit, offset) = crou_core::pagination::page(params.limit, params.offset);
    let notifications =
        NotificationRepo::list_for_user(&state.pool, user.user_id, params.unread_only, limit, offset)
            .await?;
    Ok(Json(DataResponse::new(notifications)))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> AppResult<Json<DataResponse<UnreadCount>>> {
    let count = NotificationRepo::unread_count(&state.pool, user.user_id).await?;
    Ok(Json(DataResponse::new(UnreadCount { count })))
}

/// POST /api/notifications/{id}/read
///
/// 404 when the notification belongs to someone else or is already read.
pub async fn mark_read(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !NotificationRepo::mark_read(&state.pool, id, user.user_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Notification",
            id,
        }));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> AppResult<Json<DataResponse<MarkedRead>>> {
    let marked_read = NotificationRepo::mark_all_read(&state.pool, user.user_id).await?;
    Ok(Json(DataResponse::new(MarkedRead { marked_read })))
}
