use std::fmt;
use std::str::FromStr;

use rally_types::api::SearchParams;
use rally_types::models::UserId;
use tracing::debug;

use crate::error::Denial;

/// Ordering applied to a petition search. Every key is followed by
/// ascending petition id, so equal keys always come back in the same order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    AlphabeticalAsc,
    AlphabeticalDesc,
    CostAsc,
    CostDesc,
    #[default]
    CreatedAsc,
    CreatedDesc,
}

impl SortKey {
    fn order_by(self) -> &'static str {
        match self {
            // Titles order by letter, ignoring ASCII case.
            Self::AlphabeticalAsc => "p.title COLLATE NOCASE ASC",
            Self::AlphabeticalDesc => "p.title COLLATE NOCASE DESC",
            // Petitions without tiers have a NULL cost and go last either way.
            Self::CostAsc => "supporting_cost IS NULL, supporting_cost ASC",
            Self::CostDesc => "supporting_cost IS NULL, supporting_cost DESC",
            Self::CreatedAsc => "p.creation_date ASC",
            Self::CreatedDesc => "p.creation_date DESC",
        }
    }
}

impl FromStr for SortKey {
    type Err = Denial;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALPHABETICAL_ASC" => Ok(Self::AlphabeticalAsc),
            "ALPHABETICAL_DESC" => Ok(Self::AlphabeticalDesc),
            "COST_ASC" => Ok(Self::CostAsc),
            "COST_DESC" => Ok(Self::CostDesc),
            "CREATED_ASC" => Ok(Self::CreatedAsc),
            "CREATED_DESC" => Ok(Self::CreatedDesc),
            other => Err(Denial::invalid(format!(
                "data/sortBy must be equal to one of the allowed values, got \"{other}\""
            ))),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AlphabeticalAsc => "ALPHABETICAL_ASC",
            Self::AlphabeticalDesc => "ALPHABETICAL_DESC",
            Self::CostAsc => "COST_ASC",
            Self::CostDesc => "COST_DESC",
            Self::CreatedAsc => "CREATED_ASC",
            Self::CreatedDesc => "CREATED_DESC",
        };
        f.write_str(name)
    }
}

/// Filters, ordering and window for a petition search. `None` means the
/// filter is absent and constrains nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PetitionQuery {
    /// Case-sensitive literal substring of the title or the description.
    pub text: Option<String>,
    /// `Some(empty)` when every supplied id was malformed: matches nothing.
    pub category_ids: Option<Vec<i64>>,
    /// At least one tier must cost this much or less.
    pub max_supporting_cost: Option<i64>,
    pub owner_id: Option<UserId>,
    pub supporter_id: Option<UserId>,
    pub sort: SortKey,
    pub start_index: Option<usize>,
    pub count: Option<usize>,
}

impl PetitionQuery {
    /// Reads the wire parameters. Numbers that are not non-negative integers
    /// are treated as absent; only an unknown `sortBy` is an error.
    pub fn from_params(params: &SearchParams) -> Result<Self, Denial> {
        let sort = match params.sort_by.as_deref() {
            Some(s) if !s.is_empty() => s.parse()?,
            _ => SortKey::default(),
        };

        let category_ids = if params.category_ids.is_empty() {
            None
        } else {
            Some(
                params
                    .category_ids
                    .iter()
                    .filter_map(|id| non_negative(Some(id)))
                    .collect(),
            )
        };

        Ok(Self {
            text: params.q.clone().filter(|q| !q.is_empty()),
            category_ids,
            max_supporting_cost: non_negative(params.supporting_cost.as_deref()),
            owner_id: non_negative(params.owner_id.as_deref()),
            supporter_id: non_negative(params.supporter_id.as_deref()),
            sort,
            start_index: non_negative(params.start_index.as_deref()).map(|n| n as usize),
            count: non_negative(params.count.as_deref()).map(|n| n as usize),
        })
    }
}

fn non_negative(raw: Option<&str>) -> Option<i64> {
    raw?.trim().parse::<i64>().ok().filter(|n| *n >= 0)
}

/// A value bound to one `?` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Integer(i64),
    Text(String),
}

/// Composed search statement. `params` line up with the `?` placeholders in
/// `sql`, left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Result columns, in order: id, title, category_id, owner_id,
/// owner first name, owner last name, creation_date, supporting_cost.
const SELECT_SUMMARY: &str = "SELECT p.id, p.title, p.category_id, p.owner_id, \
     u.first_name, u.last_name, p.creation_date, \
     (SELECT MIN(t.cost) FROM support_tiers t WHERE t.petition_id = p.id) AS supporting_cost \
     FROM petitions p JOIN users u ON u.id = p.owner_id";

/// Builds the search statement. User input only ever reaches the statement
/// through bound parameters.
pub fn compose(query: &PetitionQuery) -> SqlQuery {
    let mut conditions: Vec<String> = Vec::new();
    let mut params = Vec::new();

    if let Some(text) = &query.text {
        conditions.push("(instr(p.title, ?) > 0 OR instr(p.description, ?) > 0)".into());
        params.push(SqlValue::Text(text.clone()));
        params.push(SqlValue::Text(text.clone()));
    }

    if let Some(ids) = &query.category_ids {
        if ids.is_empty() {
            conditions.push("0 = 1".into());
        } else {
            let placeholders = vec!["?"; ids.len()].join(", ");
            conditions.push(format!("p.category_id IN ({placeholders})"));
            params.extend(ids.iter().map(|id| SqlValue::Integer(*id)));
        }
    }

    if let Some(cost) = query.max_supporting_cost {
        conditions.push(
            "EXISTS (SELECT 1 FROM support_tiers t WHERE t.petition_id = p.id AND t.cost <= ?)".into(),
        );
        params.push(SqlValue::Integer(cost));
    }

    if let Some(owner) = query.owner_id {
        conditions.push("p.owner_id = ?".into());
        params.push(SqlValue::Integer(owner));
    }

    if let Some(supporter) = query.supporter_id {
        conditions.push(
            "EXISTS (SELECT 1 FROM supporters s WHERE s.petition_id = p.id AND s.user_id = ?)".into(),
        );
        params.push(SqlValue::Integer(supporter));
    }

    let mut sql = String::from(SELECT_SUMMARY);
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(query.sort.order_by());
    sql.push_str(", p.id ASC");

    debug!(sort = %query.sort, filters = conditions.len(), "composed petition search");
    SqlQuery { sql, params }
}

/// One page of results plus the number of matches before slicing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Skips `start_index` items, then keeps at most `count`. A start past the
/// end gives an empty page.
pub fn paginate<T>(items: Vec<T>, start_index: Option<usize>, count: Option<usize>) -> Page<T> {
    let total = items.len();
    let items = items
        .into_iter()
        .skip(start_index.unwrap_or(0))
        .take(count.unwrap_or(usize::MAX))
        .collect();
    Page { items, total }
}
