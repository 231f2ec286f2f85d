use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::jwt::AdminUser,
    error::AppError,
    slots::{dto::CreateSlotRequest, repo},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/creneaux", get(list_available).post(create_slot))
        .route("/creneaux/:id", delete(delete_slot))
}

#[instrument(skip(state))]
pub async fn list_available(
    State(state): State<AppState>,
) -> Result<Json<Vec<repo::Slot>>, AppError> {
    let slots = repo::list_available(&state.db).await?;
    Ok(Json(slots))
}

#[instrument(skip(state, admin, payload))]
pub async fn create_slot(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(payload): Json<CreateSlotRequest>,
) -> Result<(StatusCode, Json<repo::Slot>), AppError> {
    if payload.end_time <= payload.start_time {
        return Err(AppError::validation("End time must be after start time"));
    }
    let slot = repo::create(&state.db, payload.date, payload.start_time, payload.end_time).await?;
    info!(slot_id = %slot.id, admin_id = %admin.0.id, "slot created");
    Ok((StatusCode::CREATED, Json(slot)))
}

#[instrument(skip(state, admin))]
pub async fn delete_slot(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    repo::delete(&state.db, id).await?;
    info!(slot_id = %id, admin_id = %admin.0.id, "slot deleted");
    Ok(StatusCode::NO_CONTENT)
}
