use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use axum_extra::extract::Query;
use tracing::{debug, info};

use rally_core::search::PetitionQuery;
use rally_core::{Denial, rules};
use rally_db::models::NewPetition;
use rally_db::queries::now;
use rally_types::api::{
    CreatePetitionRequest, CreatePetitionResponse, EditPetitionRequest, SearchParams,
    SearchResponse,
};

use crate::auth::{AppState, run_blocking};
use crate::error::ApiError;
use crate::images::{ImageType, image_filename};
use crate::middleware::Caller;
use crate::payload;
use crate::users::image_type;

pub(crate) const NO_PETITION: &str = "No petition found with id";

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = PetitionQuery::from_params(&params)?;
    let page = run_blocking(&state, move |s| Ok(s.db.search_petitions(&query)?)).await?;

    debug!("Search matched {} petitions, returning {}", page.total, page.items.len());
    Ok(Json(SearchResponse {
        petitions: page.items,
        count: page.total,
    }))
}

pub async fn get_petition(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = payload::parse_id(&raw_id, NO_PETITION)?;
    let petition = run_blocking(&state, move |s| Ok(s.db.get_petition(id)?))
        .await?
        .ok_or_else(|| Denial::not_found(NO_PETITION))?;
    Ok(Json(petition))
}

pub async fn categories(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let categories = run_blocking(&state, |s| Ok(s.db.get_categories()?)).await?;
    Ok(Json(categories))
}

pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let owner_id = caller.user_id()?;
    let req: CreatePetitionRequest = payload::parse(&body)?;
    rules::check_tier_set(req.support_tiers.iter().map(|t| t.title.as_str()))?;

    let petition_id = run_blocking(&state, move |s| {
        let petition = NewPetition {
            title: &req.title,
            description: &req.description,
            category_id: req.category_id,
            owner_id,
            created_at: now(),
        };
        Ok(s.db.create_petition(&petition, &req.support_tiers)?)
    })
    .await?;

    info!("User {} created petition {}", owner_id, petition_id);
    Ok((
        StatusCode::CREATED,
        Json(CreatePetitionResponse { petition_id }),
    ))
}

pub async fn edit(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let caller_id = caller.user_id()?;
    let req: EditPetitionRequest = payload::parse(&body)?;
    let id = payload::parse_id(&raw_id, NO_PETITION)?;

    run_blocking(&state, move |s| {
        s.db.with_tx(|tx| {
            let facts = tx.petition_facts(id)?;
            rules::edit_petition(caller_id, facts.as_ref())?;

            let mut petition = tx
                .get_petition_row(id)?
                .ok_or_else(|| Denial::not_found(NO_PETITION))?;
            if let Some(title) = req.title {
                petition.title = title;
            }
            if let Some(description) = req.description {
                petition.description = description;
            }
            if let Some(category_id) = req.category_id {
                petition.category_id = category_id;
            }
            tx.update_petition(&petition)?;
            Ok(())
        })
    })
    .await?;

    info!("Petition {} edited", id);
    Ok(StatusCode::OK)
}

pub async fn delete(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let caller_id = caller.user_id()?;
    let id = payload::parse_id(&raw_id, NO_PETITION)?;

    let image = run_blocking(&state, move |s| {
        s.db.with_tx(|tx| {
            let facts = tx.petition_facts(id)?;
            rules::delete_petition(caller_id, facts.as_ref())?;
            let image = tx.get_petition_row(id)?.and_then(|p| p.image_filename);
            tx.delete_petition(id)?;
            Ok(image)
        })
    })
    .await?;

    if let Some(filename) = image {
        state.images.remove(&filename).await?;
    }
    info!("Petition {} deleted", id);
    Ok(StatusCode::OK)
}

pub async fn get_image(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = payload::parse_id(&raw_id, NO_PETITION)?;
    let filename = run_blocking(&state, move |s| Ok(s.db.get_petition_row(id)?))
        .await?
        .and_then(|p| p.image_filename)
        .ok_or_else(|| Denial::not_found("No image for petition"))?;

    let kind = ImageType::from_filename(&filename)
        .ok_or_else(|| anyhow::anyhow!("stored image {} has no known type", filename))?;
    let data = state.images.read(&filename).await?;
    Ok(([(header::CONTENT_TYPE, kind.mime())], data))
}

/// 201 for the first image, 200 when replacing one.
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
    let id = payload::parse_id(&raw_id, NO_PETITION)?;

    run_blocking(&state, move |s| {
        let facts = s.db.petition_facts(id)?;
        Ok(rules::set_petition_image(caller_id, facts.as_ref())?)
    })
    .await?;

    // New file first, then the row, then the old file, so the row never
    // names a file that is gone.
    let filename = image_filename("petition", id, kind);
    state.images.write(&filename, &body).await?;

    let stored = filename.clone();
    let previous = run_blocking(&state, move |s| {
        s.db.with_tx(|tx| {
            let previous = tx.get_petition_row(id)?.and_then(|p| p.image_filename);
            tx.set_petition_image(id, Some(&stored))?;
            Ok(previous)
        })
    })
    .await?;
    state.images.remove_replaced(previous.as_deref(), &filename).await?;

    debug!("Petition {} image set to {}", id, filename);
    Ok(if previous.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    })
}
