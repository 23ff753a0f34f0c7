use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use rally_core::{Denial, rules};
use rally_db::models::NewSupporter;
use rally_db::queries::now;
use rally_types::api::{CreateSupporterRequest, CreateSupporterResponse};

use crate::auth::{AppState, run_blocking};
use crate::error::ApiError;
use crate::middleware::Caller;
use crate::payload;
use crate::petitions::NO_PETITION;

/// A petition nobody supports yet lists an empty array.
pub async fn list(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let petition_id = payload::parse_id(&raw_id, NO_PETITION)?;

    let supporters = run_blocking(&state, move |s| {
        if s.db.petition_facts(petition_id)?.is_none() {
            return Err(Denial::not_found(NO_PETITION).into());
        }
        Ok(s.db.get_supporters(petition_id)?)
    })
    .await?;

    Ok(Json(supporters))
}

pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let caller_id = caller.user_id()?;
    let req: CreateSupporterRequest = payload::parse(&body)?;
    let petition_id = payload::parse_id(&raw_id, NO_PETITION)?;

    let support_id = run_blocking(&state, move |s| {
        s.db.with_tx(|tx| {
            let petition = tx.petition_facts(petition_id)?;
            let tier = tx.tier_facts(req.support_tier_id)?;
            rules::create_supporter(caller_id, petition.as_ref(), tier.as_ref())?;

            let supporter = NewSupporter {
                petition_id,
                support_tier_id: req.support_tier_id,
                user_id: caller_id,
                message: req.message.as_deref(),
                timestamp: now(),
            };
            Ok(tx.create_supporter(&supporter)?)
        })
    })
    .await?;

    info!("User {} supported petition {}", caller_id, petition_id);
    Ok((StatusCode::CREATED, Json(CreateSupporterResponse { support_id })))
}
