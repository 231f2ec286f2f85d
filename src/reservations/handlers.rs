use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::jwt::{AdminUser, AuthUser},
    error::AppError,
    reservations::{
        dto::{CreateReservationRequest, UpdateReservationRequest},
        repo,
    },
    state::AppState,
    users::repo::Role,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reservations", get(list_all).post(create_reservation))
        .route("/reservations/me", get(list_mine))
        .route(
            "/reservations/:id",
            put(update_reservation).delete(cancel_reservation),
        )
        .route("/reservations/admin/:id", delete(admin_delete_reservation))
}

fn require_client(user: &AuthUser) -> Result<(), AppError> {
    if user.role != Role::Client {
        return Err(AppError::forbidden("Reservations are client self-service"));
    }
    Ok(())
}

#[instrument(skip(state, user))]
pub async fn list_mine(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<repo::ReservationWithSlot>>, AppError> {
    if user.role != Role::Client && user.role != Role::Admin {
        return Err(AppError::forbidden("Insufficient permissions"));
    }
    let rows = repo::list_for_user(&state.db, user.id).await?;
    Ok(Json(rows))
}

#[instrument(skip(state, _admin))]
pub async fn list_all(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<repo::ReservationDetails>>, AppError> {
    let rows = repo::list_all(&state.db).await?;
    Ok(Json(rows))
}

#[instrument(skip(state, user, payload))]
pub async fn create_reservation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<repo::Reservation>), AppError> {
    require_client(&user)?;
    // Always bound to the authenticated caller, never a body-supplied user.
    let reservation = repo::create(&state.db, user.id, payload.slot_id).await?;
    info!(reservation_id = %reservation.id, user_id = %user.id, slot_id = %payload.slot_id, "reservation created");
    Ok((StatusCode::CREATED, Json(reservation)))
}

#[instrument(skip(state, user, payload))]
pub async fn update_reservation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateReservationRequest>,
) -> Result<Json<repo::Reservation>, AppError> {
    require_client(&user)?;
    let reservation = repo::change_slot(&state.db, id, user.id, payload.new_slot_id).await?;
    info!(reservation_id = %id, user_id = %user.id, new_slot_id = %payload.new_slot_id, "reservation moved");
    Ok(Json(reservation))
}

#[instrument(skip(state, user))]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_client(&user)?;
    repo::cancel(&state.db, id, user.id).await?;
    info!(reservation_id = %id, user_id = %user.id, "reservation cancelled");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, admin))]
pub async fn admin_delete_reservation(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    repo::admin_delete(&state.db, id).await?;
    info!(reservation_id = %id, admin_id = %admin.0.id, "reservation removed by admin");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_client_rejects_other_roles() {
        let client = AuthUser {
            id: 1,
            role: Role::Client,
        };
        let admin = AuthUser {
            id: 2,
            role: Role::Admin,
        };
        let legacy = AuthUser {
            id: 3,
            role: Role::User,
        };
        assert!(require_client(&client).is_ok());
        assert!(require_client(&admin).is_err());
        assert!(require_client(&legacy).is_err());
    }
}
