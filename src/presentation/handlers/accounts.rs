use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{debug, info};

use super::AppState;
use crate::{
    application::{
        ValidationError,
        dto::{CreateUserRequest, CreateUserResponse, LoginRequest, LoginResponse},
    },
    domain::entities::AccountId,
    presentation::middleware::{AuthError, SessionOption, error::AppError},
};

fn malformed(rejection: &JsonRejection) -> AppError {
    let error = ValidationError::MalformedBody(rejection.body_text());
    debug!(reason = %error, "Account request body could not be decoded");
    AppError::Validation { message: error.to_string() }
}

fn session_token(
    state: &AppState,
    account: AccountId,
    option: SessionOption,
) -> Result<String, AppError> {
    state
        .tokens
        .issue_session_token(account, option, Utc::now())
        .map_err(|e| AuthError::from(e).into())
}

/// Register an account with its profile and first API key
///
/// # Errors
/// 400 for invalid input, 409 when the email or username is taken
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload.map_err(|rejection| malformed(&rejection))?;

    let registered = state.register_account.execute(request).await?;
    let token = session_token(&state, registered.account.id, SessionOption::Always)?;

    info!(account = %registered.account.id, "Create user request completed");
    Ok((StatusCode::CREATED, Json(CreateUserResponse::new(&registered, token))))
}

/// Check a password and return an API key plus a session token
///
/// # Errors
/// 400 for invalid input, 401 for an unknown account or wrong password
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload.map_err(|rejection| malformed(&rejection))?;

    let option = match request.session_option.as_deref() {
        None => SessionOption::Always,
        Some(raw) => {
            raw.parse::<SessionOption>().map_err(|message| AppError::Validation { message })?
        }
    };

    let logged_in = state.login.execute(request).await?;
    let token = session_token(&state, logged_in.account.id, option)?;

    info!(account = %logged_in.account.id, "Login request completed");
    let response = LoginResponse::new(&logged_in.account, &logged_in.credential, token);
    Ok((StatusCode::OK, Json(response)))
}
