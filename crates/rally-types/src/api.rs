use serde::{Deserialize, Serialize};

use crate::models::{PetitionSummary, UserId};
use crate::validate::{Validate, check_email, check_len, check_non_negative, check_opt_len};

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), String> {
        check_len("firstName", &self.first_name, 1, 64)?;
        check_len("lastName", &self.last_name, 1, 64)?;
        check_email("email", &self.email)?;
        check_len("password", &self.password, 6, 64)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), String> {
        check_email("email", &self.email)?;
        check_len("password", &self.password, 1, 64)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: UserId,
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditUserRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
    pub current_password: Option<String>,
}

impl Validate for EditUserRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(email) = &self.email {
            check_email("email", email)?;
        }
        check_opt_len("firstName", self.first_name.as_deref(), 1, 64)?;
        check_opt_len("lastName", self.last_name.as_deref(), 1, 64)?;
        check_opt_len("password", self.password.as_deref(), 6, 64)?;
        check_opt_len("currentPassword", self.current_password.as_deref(), 6, 64)?;
        match (&self.password, &self.current_password) {
            (Some(_), None) => Err("data must have property currentPassword when password is given".into()),
            (None, Some(_)) => Err("data must have property password when currentPassword is given".into()),
            _ => Ok(()),
        }
    }
}

// -- Petitions --

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSupportTier {
    pub title: String,
    pub description: String,
    pub cost: i64,
}

impl Validate for NewSupportTier {
    fn validate(&self) -> Result<(), String> {
        check_len("title", &self.title, 1, 128)?;
        check_len("description", &self.description, 1, 1024)?;
        check_non_negative("cost", self.cost)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePetitionRequest {
    pub title: String,
    pub description: String,
    pub category_id: i64,
    pub support_tiers: Vec<NewSupportTier>,
}

impl Validate for CreatePetitionRequest {
    fn validate(&self) -> Result<(), String> {
        check_len("title", &self.title, 1, 128)?;
        check_len("description", &self.description, 1, 1024)?;
        for tier in &self.support_tiers {
            tier.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePetitionResponse {
    pub petition_id: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPetitionRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
}

impl Validate for EditPetitionRequest {
    fn validate(&self) -> Result<(), String> {
        check_opt_len("title", self.title.as_deref(), 1, 128)?;
        check_opt_len("description", self.description.as_deref(), 1, 1024)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSupportTierResponse {
    pub support_tier_id: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSupportTierRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cost: Option<i64>,
}

impl Validate for EditSupportTierRequest {
    fn validate(&self) -> Result<(), String> {
        check_opt_len("title", self.title.as_deref(), 1, 128)?;
        check_opt_len("description", self.description.as_deref(), 1, 1024)?;
        match self.cost {
            Some(cost) => check_non_negative("cost", cost),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSupporterRequest {
    pub support_tier_id: i64,
    pub message: Option<String>,
}

impl Validate for CreateSupporterRequest {
    fn validate(&self) -> Result<(), String> {
        check_opt_len("message", self.message.as_deref(), 1, 512)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSupporterResponse {
    pub support_id: i64,
}

// -- Search --

/// Raw `GET /petitions` query string. Every value stays a string here so that
/// malformed numbers can degrade to "no filter" instead of failing extraction.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub q: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<String>,
    pub supporting_cost: Option<String>,
    pub owner_id: Option<String>,
    pub supporter_id: Option<String>,
    pub sort_by: Option<String>,
    pub start_index: Option<String>,
    pub count: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub petitions: Vec<PetitionSummary>,
    /// Number of matches before pagination.
    pub count: usize,
}
