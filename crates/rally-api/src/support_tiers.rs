use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use rally_core::{Denial, rules};
use rally_types::api::{AddSupportTierResponse, EditSupportTierRequest, NewSupportTier};

use crate::auth::{AppState, run_blocking};
use crate::error::ApiError;
use crate::middleware::Caller;
use crate::payload;
use crate::petitions::NO_PETITION;

const NO_TIER: &str = "Support tier does not exist on petition";

pub async fn add(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let caller_id = caller.user_id()?;
    let tier: NewSupportTier = payload::parse(&body)?;
    let petition_id = payload::parse_id(&raw_id, NO_PETITION)?;

    let support_tier_id = run_blocking(&state, move |s| {
        s.db.with_tx(|tx| {
            let facts = tx.petition_facts(petition_id)?;
            rules::add_support_tier(caller_id, facts.as_ref())?;
            Ok(tx.add_support_tier(petition_id, &tier)?)
        })
    })
    .await?;

    info!("Support tier {} added to petition {}", support_tier_id, petition_id);
    Ok((
        StatusCode::CREATED,
        Json(AddSupportTierResponse { support_tier_id }),
    ))
}

pub async fn edit(
    State(state): State<AppState>,
    caller: Caller,
    Path((raw_id, raw_tier_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let caller_id = caller.user_id()?;
    let req: EditSupportTierRequest = payload::parse(&body)?;
    let petition_id = payload::parse_id(&raw_id, NO_PETITION)?;
    let tier_id = payload::parse_id(&raw_tier_id, NO_TIER)?;

    run_blocking(&state, move |s| {
        s.db.with_tx(|tx| {
            let petition = tx.petition_facts(petition_id)?;
            let tier = tx.tier_facts(tier_id)?;
            rules::edit_support_tier(caller_id, petition.as_ref(), tier.as_ref())?;

            let mut current = tx
                .get_support_tier(tier_id)?
                .ok_or_else(|| Denial::not_found(NO_TIER))?;
            if let Some(title) = req.title {
                current.title = title;
            }
            if let Some(description) = req.description {
                current.description = description;
            }
            if let Some(cost) = req.cost {
                current.cost = cost;
            }
            tx.update_support_tier(&current)?;
            Ok(())
        })
    })
    .await?;

    info!("Support tier {} of petition {} edited", tier_id, petition_id);
    Ok(StatusCode::OK)
}

pub async fn delete(
    State(state): State<AppState>,
    caller: Caller,
    Path((raw_id, raw_tier_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let caller_id = caller.user_id()?;
    let petition_id = payload::parse_id(&raw_id, NO_PETITION)?;
    let tier_id = payload::parse_id(&raw_tier_id, NO_TIER)?;

    run_blocking(&state, move |s| {
        s.db.with_tx(|tx| {
            let petition = tx.petition_facts(petition_id)?;
            let tier = tx.tier_facts(tier_id)?;
            rules::delete_support_tier(caller_id, petition.as_ref(), tier.as_ref())?;
            Ok(tx.delete_support_tier(tier_id)?)
        })
    })
    .await?;

    info!("Support tier {} removed from petition {}", tier_id, petition_id);
    Ok(StatusCode::OK)
}
