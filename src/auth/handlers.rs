use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, PublicUser,
            RegisterRequest, ResetPasswordRequest,
        },
        jwt::JwtKeys,
        password::{hash_password, verify_password},
    },
    error::AppError,
    state::AppState,
    users::repo::{Role, User},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn generate_reset_token() -> String {
    let bytes: [u8; 32] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn build_reset_link(frontend_base_url: &str, token: &str, email: &str) -> String {
    format!("{frontend_base_url}/reset-password?token={token}&email={email}")
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }
    if payload.username.trim().is_empty() {
        return Err(AppError::validation("Username is required"));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(AppError::validation("Password too short"));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::validation("Email already registered"));
    }

    let hash = hash_password(&payload.password)?;
    // Role is fixed server-side; self-registration never grants privileges.
    let user = User::create(
        &state.db,
        payload.username.trim(),
        &payload.email,
        &hash,
        Role::Client,
    )
    .await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.email, user.role)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: PublicUser::from(&user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.email = payload.email.trim().to_lowercase();

    // One generic message for both unknown email and wrong password.
    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(AppError::auth("Invalid email or password"));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(AppError::auth("Invalid email or password"));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.email, user.role)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::validation("Email is required"));
    }

    // Same body whether or not the account exists, so the endpoint cannot be
    // used to enumerate registered emails.
    let generic = MessageResponse {
        message: "If the email exists, a reset link has been sent.".to_string(),
    };

    let user = match User::find_by_email(&state.db, &email).await? {
        Some(u) => u,
        None => {
            info!("password reset requested for unknown email");
            return Ok(Json(generic));
        }
    };

    let token = generate_reset_token();
    let expires = OffsetDateTime::now_utc() + Duration::hours(1);
    User::set_reset_token(&state.db, user.id, &token, expires).await?;

    let link = build_reset_link(&state.config.frontend_base_url, &token, &user.email);
    let body = format!("<p>Click <a href=\"{link}\">here</a> to reset your password.</p>");
    if let Err(e) = state
        .mailer
        .send(&user.email, "Password reset", &body)
        .await
    {
        error!(error = %e, user_id = %user.id, "reset email dispatch failed");
        return Err(AppError::Internal(e));
    }

    info!(user_id = %user.id, "password reset email sent");
    Ok(Json(generic))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = payload.email.trim().to_lowercase();
    if payload.new_password.len() < 8 {
        return Err(AppError::validation("Password too short"));
    }

    let hash = hash_password(&payload.new_password)?;
    let updated = User::reset_password(&state.db, &email, &payload.token, &hash).await?;
    if !updated {
        warn!("password reset with invalid or expired token");
        return Err(AppError::validation("Invalid or expired reset link"));
    }

    info!("password reset completed");
    Ok(Json(MessageResponse {
        message: "Password has been reset.".to_string(),
    }))
}
