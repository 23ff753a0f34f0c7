//! Database row types, mapped directly from SQLite rows.
//! Distinct from rally-types API models to keep the DB layer independent.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

/// Timestamps are stored as UTC text in this format so that string order is
/// time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Reads column `idx` as a stored timestamp.
pub fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub auth_token: Option<String>,
    pub image_filename: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PetitionRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category_id: i64,
    pub owner_id: i64,
    pub creation_date: DateTime<Utc>,
    pub image_filename: Option<String>,
}

pub struct NewPetition<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub category_id: i64,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

pub struct NewSupporter<'a> {
    pub petition_id: i64,
    pub support_tier_id: i64,
    pub user_id: i64,
    pub message: Option<&'a str>,
    pub timestamp: DateTime<Utc>,
}
