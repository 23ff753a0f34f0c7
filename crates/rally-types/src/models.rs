use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type PetitionId = i64;
pub type SupportTierId = i64;

/// One row of a petition search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetitionSummary {
    pub petition_id: PetitionId,
    pub title: String,
    pub category_id: i64,
    pub owner_id: UserId,
    pub owner_first_name: String,
    pub owner_last_name: String,
    pub creation_date: DateTime<Utc>,
    /// Cheapest tier of the petition, `None` when it has no tiers.
    pub supporting_cost: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportTier {
    pub support_tier_id: SupportTierId,
    pub title: String,
    pub description: String,
    pub cost: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetitionDetail {
    pub petition_id: PetitionId,
    pub title: String,
    pub description: String,
    pub category_id: i64,
    pub owner_id: UserId,
    pub owner_first_name: String,
    pub owner_last_name: String,
    pub number_of_supporters: i64,
    pub creation_date: DateTime<Utc>,
    pub money_raised: i64,
    pub support_tiers: Vec<SupportTier>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supporter {
    pub support_id: i64,
    pub support_tier_id: SupportTierId,
    pub message: Option<String>,
    pub supporter_id: UserId,
    pub supporter_first_name: String,
    pub supporter_last_name: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub category_id: i64,
    pub name: String,
}

/// Public view of a user. The email is only filled in for the user themself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}
