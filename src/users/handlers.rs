use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{handlers::is_valid_email, jwt::AdminUser, password::hash_password},
    error::AppError,
    state::AppState,
    users::{
        dto::{CreateUserRequest, UpdateUserRequest},
        repo::User,
    },
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, _admin))]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<User>>, AppError> {
    let users = User::list(&state.db).await?;
    Ok(Json(users))
}

#[instrument(skip(state, _admin))]
pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<User>, AppError> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(user))
}

#[instrument(skip(state, admin, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(mut payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        return Err(AppError::validation("Invalid email"));
    }
    if payload.password.len() < 8 {
        return Err(AppError::validation("Password too short"));
    }
    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::validation("Email already registered"));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(
        &state.db,
        payload.username.trim(),
        &payload.email,
        &hash,
        payload.role,
    )
    .await?;

    info!(user_id = %user.id, admin_id = %admin.0.id, role = ?user.role, "user created by admin");
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, admin, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i64>,
    Json(mut payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        return Err(AppError::validation("Invalid email"));
    }

    let user = User::update_profile(
        &state.db,
        id,
        payload.username.trim(),
        &payload.email,
        payload.role,
    )
    .await?
    .ok_or_else(|| AppError::not_found("User not found"))?;

    info!(user_id = %id, admin_id = %admin.0.id, role = ?user.role, "user updated by admin");
    Ok(Json(user))
}

#[instrument(skip(state, admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !User::delete_cascading(&state.db, id).await? {
        return Err(AppError::not_found("User not found"));
    }
    info!(user_id = %id, admin_id = %admin.0.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
