use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use tracing::{debug, info, warn};

use rally_core::{Denial, rules};
use rally_types::api::EditUserRequest;
use rally_types::models::UserProfile;

use crate::auth::{AppState, run_blocking};
use crate::error::ApiError;
use crate::images::{ImageType, image_filename};
use crate::middleware::Caller;
use crate::payload;

const NO_USER: &str = "No user with specified ID";

/// Anyone may look a user up; only the user themself sees the email.
pub async fn view(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = payload::parse_id(&raw_id, NO_USER)?;
    let user = run_blocking(&state, move |s| Ok(s.db.get_user_by_id(id)?))
        .await?
        .ok_or_else(|| Denial::not_found(NO_USER))?;

    let email = (caller.id() == Some(user.id)).then_some(user.email);
    Ok(Json(UserProfile {
        first_name: user.first_name,
        last_name: user.last_name,
        email,
    }))
}

pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let caller_id = caller.user_id()?;
    let req: EditUserRequest = payload::parse(&body)?;
    let id = payload::parse_id(&raw_id, NO_USER)?;

    run_blocking(&state, move |s| {
        let user = s.db.get_user_by_id(id)?;
        rules::edit_user(caller_id, user.as_ref().map(|u| u.id))?;
        let mut user = user.ok_or_else(|| Denial::not_found(NO_USER))?;

        if let (Some(new), Some(current)) = (&req.password, &req.current_password) {
            let matches = s.credentials.verify(current, &user.password)?;
            rules::change_password(matches, current, new)?;
            user.password = s.credentials.hash(new)?;
        }
        if let Some(email) = req.email {
            user.email = email;
        }
        if let Some(first_name) = req.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = req.last_name {
            user.last_name = last_name;
        }

        s.db.update_user(&user)?;
        Ok(())
    })
    .await?;

    info!("User {} updated their profile", id);
    Ok(StatusCode::OK)
}

pub async fn get_image(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = payload::parse_id(&raw_id, NO_USER)?;
    let filename = run_blocking(&state, move |s| Ok(s.db.get_user_by_id(id)?))
        .await?
        .and_then(|u| u.image_filename)
        .ok_or_else(|| Denial::not_found("No image for user"))?;

    let kind = ImageType::from_filename(&filename)
        .ok_or_else(|| anyhow::anyhow!("stored image {} has no known type", filename))?;
    let data = state.images.read(&filename).await?;
    Ok(([(header::CONTENT_TYPE, kind.mime())], data))
}

/// 201 when the user had no image before, 200 when one was replaced.
pub async fn set_image(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let caller_id = caller.user_id()?;
    let kind = image_type(&headers)?;
    if body.is_empty() {
        return Err(Denial::invalid("image body must not be empty").into());
    }
    let id = payload::parse_id(&raw_id, NO_USER)?;

    run_blocking(&state, move |s| {
        let user = s.db.get_user_by_id(id)?;
        Ok(rules::edit_user_image(caller_id, user.as_ref().map(|u| u.id))?)
    })
    .await?;

    let filename = image_filename("user", id, kind);
    state.images.write(&filename, &body).await?;

    let stored = filename.clone();
    let previous = run_blocking(&state, move |s| {
        let previous = s.db.get_user_by_id(id)?.and_then(|u| u.image_filename);
        s.db.set_user_image(id, Some(&stored))?;
        Ok(previous)
    })
    .await?;
    state.images.remove_replaced(previous.as_deref(), &filename).await?;

    debug!("User {} image set to {}", id, filename);
    Ok(if previous.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    })
}

pub async fn delete_image(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let caller_id = caller.user_id()?;
    let id = payload::parse_id(&raw_id, NO_USER)?;

    let previous = run_blocking(&state, move |s| {
        let user = s.db.get_user_by_id(id)?;
        rules::edit_user_image(caller_id, user.as_ref().map(|u| u.id))?;
        Ok(user.and_then(|u| u.image_filename))
    })
    .await?;

    let Some(filename) = previous else {
        warn!("User {} has no image to delete", id);
        return Err(Denial::not_found("No image for user").into());
    };
    state.images.remove(&filename).await?;
    run_blocking(&state, move |s| Ok(s.db.set_user_image(id, None)?)).await?;

    info!("User {} image removed", id);
    Ok(StatusCode::OK)
}

/// Declared content type of an image upload.
pub(crate) fn image_type(headers: &HeaderMap) -> Result<ImageType, Denial> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(ImageType::from_mime)
        .ok_or_else(|| Denial::invalid("image must be image/jpeg, image/png or image/gif"))
}
