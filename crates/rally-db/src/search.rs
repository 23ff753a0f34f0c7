use rusqlite::params_from_iter;
use rusqlite::types::Value;

use rally_core::search::{Page, PetitionQuery, SqlValue, compose, paginate};
use rally_types::models::PetitionSummary;

use crate::models::timestamp_at;
use crate::{Database, Result};

fn to_value(param: SqlValue) -> Value {
    match param {
        SqlValue::Integer(n) => Value::Integer(n),
        SqlValue::Text(s) => Value::Text(s),
    }
}

impl Database {
    /// Runs the composed search, then cuts the requested page. `total` counts
    /// every match.
    pub fn search_petitions(&self, query: &PetitionQuery) -> Result<Page<PetitionSummary>> {
        let composed = compose(query);
        let matches = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&composed.sql)?;
            let params = params_from_iter(composed.params.iter().cloned().map(to_value));
            let rows = stmt
                .query_map(params, |row| {
                    Ok(PetitionSummary {
                        petition_id: row.get(0)?,
                        title: row.get(1)?,
                        category_id: row.get(2)?,
                        owner_id: row.get(3)?,
                        owner_first_name: row.get(4)?,
                        owner_last_name: row.get(5)?,
                        creation_date: timestamp_at(row, 6)?,
                        supporting_cost: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        Ok(paginate(matches, query.start_index, query.count))
    }
}
