use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use rally_core::rules::{PetitionFacts, TierFacts};
use rally_types::api::NewSupportTier;
use rally_types::models::{Category, PetitionDetail, SupportTier, Supporter};

use crate::models::{
    NewPetition, NewSupporter, PetitionRow, UserRow, format_timestamp, timestamp_at,
};
use crate::{Database, DbError, Result, Tx};

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, password, auth_token, image_filename";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
        password_hash: &str,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (email, first_name, last_name, password) VALUES (?1, ?2, ?3, ?4)",
                (email, first_name, last_name, password_hash),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", &email))
    }

    pub fn get_user_by_token(&self, token: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "auth_token = ?1", &token))
    }

    pub fn set_auth_token(&self, user_id: i64, token: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET auth_token = ?1 WHERE id = ?2",
                params![token, user_id],
            )?;
            Ok(())
        })
    }

    /// Returns false when no user held the token.
    pub fn clear_auth_token(&self, token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET auth_token = NULL WHERE auth_token = ?1",
                [token],
            )?;
            Ok(changed > 0)
        })
    }

    /// Writes back email, names and password hash.
    pub fn update_user(&self, user: &UserRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET email = ?1, first_name = ?2, last_name = ?3, password = ?4 WHERE id = ?5",
                params![user.email, user.first_name, user.last_name, user.password, user.id],
            )?;
            Ok(())
        })
    }

    pub fn set_user_image(&self, user_id: i64, filename: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET image_filename = ?1 WHERE id = ?2",
                params![filename, user_id],
            )?;
            Ok(())
        })
    }

    // -- Petitions --

    /// Inserts the petition and all of its tiers atomically.
    pub fn create_petition(&self, petition: &NewPetition<'_>, tiers: &[NewSupportTier]) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO petitions (title, description, creation_date, owner_id, category_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    petition.title,
                    petition.description,
                    format_timestamp(petition.created_at),
                    petition.owner_id,
                    petition.category_id,
                ],
            )
            .map_err(|e| DbError::from(e).on_foreign_key("category_id"))?;
            let petition_id = tx.last_insert_rowid();

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO support_tiers (petition_id, title, description, cost) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for tier in tiers {
                    stmt.execute(params![petition_id, tier.title, tier.description, tier.cost])?;
                }
            }

            tx.commit()?;
            debug!(petition_id, tiers = tiers.len(), "petition inserted");
            Ok(petition_id)
        })
    }

    /// Full view of one petition: owner names, tiers, supporter count and
    /// the sum of the tier costs pledged so far.
    pub fn get_petition(&self, id: i64) -> Result<Option<PetitionDetail>> {
        self.with_conn(|conn| {
            let detail = conn
                .query_row(
                    "SELECT p.id, p.title, p.description, p.category_id, p.owner_id,
                            u.first_name, u.last_name,
                            (SELECT COUNT(*) FROM supporters s WHERE s.petition_id = p.id),
                            p.creation_date,
                            (SELECT COALESCE(SUM(t.cost), 0) FROM supporters s
                                JOIN support_tiers t ON t.id = s.support_tier_id
                                WHERE s.petition_id = p.id)
                     FROM petitions p JOIN users u ON u.id = p.owner_id
                     WHERE p.id = ?1",
                    [id],
                    |row| {
                        Ok(PetitionDetail {
                            petition_id: row.get(0)?,
                            title: row.get(1)?,
                            description: row.get(2)?,
                            category_id: row.get(3)?,
                            owner_id: row.get(4)?,
                            owner_first_name: row.get(5)?,
                            owner_last_name: row.get(6)?,
                            number_of_supporters: row.get(7)?,
                            creation_date: timestamp_at(row, 8)?,
                            money_raised: row.get(9)?,
                            support_tiers: Vec::new(),
                        })
                    },
                )
                .optional()?;

            let Some(mut detail) = detail else {
                return Ok(None);
            };
            detail.support_tiers = query_tiers(conn, id)?;
            Ok(Some(detail))
        })
    }

    pub fn get_categories(&self) -> Result<Vec<Category>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(Category {
                        category_id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Supporters --

    /// Newest pledge first.
    pub fn get_supporters(&self, petition_id: i64) -> Result<Vec<Supporter>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.support_tier_id, s.message, s.user_id, u.first_name, u.last_name, s.timestamp
                 FROM supporters s JOIN users u ON u.id = s.user_id
                 WHERE s.petition_id = ?1
                 ORDER BY s.timestamp DESC, s.id DESC",
            )?;
            let rows = stmt
                .query_map([petition_id], |row| {
                    Ok(Supporter {
                        support_id: row.get(0)?,
                        support_tier_id: row.get(1)?,
                        message: row.get(2)?,
                        supporter_id: row.get(3)?,
                        supporter_first_name: row.get(4)?,
                        supporter_last_name: row.get(5)?,
                        timestamp: timestamp_at(row, 6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Check-then-write entry points used on their own --

    pub fn get_petition_row(&self, id: i64) -> Result<Option<PetitionRow>> {
        self.with_conn(|conn| Tx { conn }.get_petition_row(id))
    }

    pub fn petition_facts(&self, id: i64) -> Result<Option<PetitionFacts>> {
        self.with_conn(|conn| Tx { conn }.petition_facts(id))
    }

    pub fn tier_facts(&self, tier_id: i64) -> Result<Option<TierFacts>> {
        self.with_conn(|conn| Tx { conn }.tier_facts(tier_id))
    }

    pub fn delete_petition(&self, id: i64) -> Result<()> {
        self.with_tx(|tx| tx.delete_petition(id))
    }

    pub fn add_support_tier(&self, petition_id: i64, tier: &NewSupportTier) -> Result<i64> {
        self.with_tx(|tx| tx.add_support_tier(petition_id, tier))
    }

    pub fn create_supporter(&self, supporter: &NewSupporter<'_>) -> Result<i64> {
        self.with_tx(|tx| tx.create_supporter(supporter))
    }
}

/// Reads and writes for the check-then-write paths. Handlers run these inside
/// [`Database::with_tx`] so the facts a rule was decided on cannot change
/// before the write lands.
impl Tx<'_> {
    pub fn get_petition_row(&self, id: i64) -> Result<Option<PetitionRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, title, description, category_id, owner_id, creation_date, image_filename
                 FROM petitions WHERE id = ?1",
                [id],
                |row| {
                    Ok(PetitionRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        description: row.get(2)?,
                        category_id: row.get(3)?,
                        owner_id: row.get(4)?,
                        creation_date: timestamp_at(row, 5)?,
                        image_filename: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn petition_facts(&self, id: i64) -> Result<Option<PetitionFacts>> {
        let facts = self
            .conn
            .query_row(
                "SELECT p.id, p.owner_id,
                        (SELECT COUNT(*) FROM support_tiers t WHERE t.petition_id = p.id),
                        (SELECT COUNT(*) FROM supporters s WHERE s.petition_id = p.id)
                 FROM petitions p WHERE p.id = ?1",
                [id],
                |row| {
                    Ok(PetitionFacts {
                        id: row.get(0)?,
                        owner_id: row.get(1)?,
                        tier_count: row.get::<_, i64>(2)? as usize,
                        supporter_count: row.get::<_, i64>(3)? as usize,
                    })
                },
            )
            .optional()?;
        Ok(facts)
    }

    /// Writes back title, description and category. Owner and creation date
    /// are never touched.
    pub fn update_petition(&self, petition: &PetitionRow) -> Result<()> {
        self.conn.execute(
            "UPDATE petitions SET title = ?1, description = ?2, category_id = ?3 WHERE id = ?4",
            params![petition.title, petition.description, petition.category_id, petition.id],
        )
        .map_err(|e| DbError::from(e).on_foreign_key("category_id"))?;
        Ok(())
    }

    /// Tiers go with the petition.
    pub fn delete_petition(&self, id: i64) -> Result<()> {
        self.conn.execute("DELETE FROM petitions WHERE id = ?1", [id])?;
        Ok(())
    }

    pub fn set_petition_image(&self, petition_id: i64, filename: Option<&str>) -> Result<()> {
        self.conn.execute(
            "UPDATE petitions SET image_filename = ?1 WHERE id = ?2",
            params![filename, petition_id],
        )?;
        Ok(())
    }

    pub fn add_support_tier(&self, petition_id: i64, tier: &NewSupportTier) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO support_tiers (petition_id, title, description, cost) VALUES (?1, ?2, ?3, ?4)",
            params![petition_id, tier.title, tier.description, tier.cost],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_support_tier(&self, tier_id: i64) -> Result<Option<SupportTier>> {
        let tier = self
            .conn
            .query_row(
                "SELECT id, title, description, cost FROM support_tiers WHERE id = ?1",
                [tier_id],
                tier_from_row,
            )
            .optional()?;
        Ok(tier)
    }

    pub fn tier_facts(&self, tier_id: i64) -> Result<Option<TierFacts>> {
        let facts = self
            .conn
            .query_row(
                "SELECT t.id, t.petition_id,
                        (SELECT COUNT(*) FROM supporters s WHERE s.support_tier_id = t.id)
                 FROM support_tiers t WHERE t.id = ?1",
                [tier_id],
                |row| {
                    Ok(TierFacts {
                        id: row.get(0)?,
                        petition_id: row.get(1)?,
                        supporter_count: row.get::<_, i64>(2)? as usize,
                    })
                },
            )
            .optional()?;
        Ok(facts)
    }

    pub fn update_support_tier(&self, tier: &SupportTier) -> Result<()> {
        self.conn.execute(
            "UPDATE support_tiers SET title = ?1, description = ?2, cost = ?3 WHERE id = ?4",
            params![tier.title, tier.description, tier.cost, tier.support_tier_id],
        )?;
        Ok(())
    }

    pub fn delete_support_tier(&self, tier_id: i64) -> Result<()> {
        self.conn.execute("DELETE FROM support_tiers WHERE id = ?1", [tier_id])?;
        Ok(())
    }

    /// A second pledge by the same user to the same tier fails with
    /// `UniqueViolation("support_tier_id")`.
    pub fn create_supporter(&self, supporter: &NewSupporter<'_>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO supporters (petition_id, support_tier_id, user_id, message, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                supporter.petition_id,
                supporter.support_tier_id,
                supporter.user_id,
                supporter.message,
                format_timestamp(supporter.timestamp),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

fn query_user(conn: &Connection, condition: &str, value: &dyn rusqlite::ToSql) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {condition}");
    let row = conn
        .query_row(&sql, [value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                first_name: row.get(2)?,
                last_name: row.get(3)?,
                password: row.get(4)?,
                auth_token: row.get(5)?,
                image_filename: row.get(6)?,
            })
        })
        .optional()?;
    Ok(row)
}

fn tier_from_row(row: &Row<'_>) -> rusqlite::Result<SupportTier> {
    Ok(SupportTier {
        support_tier_id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        cost: row.get(3)?,
    })
}

fn query_tiers(conn: &Connection, petition_id: i64) -> Result<Vec<SupportTier>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, cost FROM support_tiers WHERE petition_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map([petition_id], tier_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Current time at the precision the store keeps.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
}
