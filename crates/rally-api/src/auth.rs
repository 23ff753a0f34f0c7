use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{error, info};

use rally_core::Denial;
use rally_db::Database;
use rally_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::credentials::{Credentials, issue_token};
use crate::error::ApiError;
use crate::images::ImageStore;
use crate::middleware::Caller;
use crate::payload;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub images: ImageStore,
    pub credentials: Credentials,
}

/// Runs blocking work (SQLite, password hashing) off the async runtime.
pub async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
}

pub async fn register(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: RegisterRequest = payload::parse(&body)?;

    let user_id = run_blocking(&state, move |s| {
        let password_hash = s.credentials.hash(&req.password)?;
        let id = s
            .db
            .create_user(&req.email, &req.first_name, &req.last_name, &password_hash)?;
        Ok(id)
    })
    .await?;

    info!("Registered user {}", user_id);
    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id })))
}

pub async fn login(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: LoginRequest = payload::parse(&body)?;

    let response = run_blocking(&state, move |s| {
        let user = s
            .db
            .get_user_by_email(&req.email)?
            .ok_or_else(|| Denial::InvalidCredentials("Incorrect email/password".into()))?;

        if !s.credentials.verify(&req.password, &user.password)? {
            return Err(Denial::InvalidCredentials("Incorrect email/password".into()).into());
        }

        let token = issue_token();
        s.db.set_auth_token(user.id, &token)?;
        Ok(LoginResponse {
            user_id: user.id,
            token,
        })
    })
    .await?;

    info!("User {} logged in", response.user_id);
    Ok(Json(response))
}

pub async fn logout(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = caller.user_id()?;
    let token = caller.token().ok_or(Denial::Unauthenticated)?.to_string();

    let cleared = run_blocking(&state, move |s| Ok(s.db.clear_auth_token(&token)?)).await?;
    if !cleared {
        return Err(Denial::Unauthenticated.into());
    }

    info!("User {} logged out", user_id);
    Ok(StatusCode::OK)
}
