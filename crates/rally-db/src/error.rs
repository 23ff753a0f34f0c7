use rusqlite::ffi;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

/// Storage failures, with constraint violations already told apart from
/// everything else.
#[derive(Debug, Error)]
pub enum DbError {
    /// A uniqueness index rejected the write. Holds the distinguishing
    /// column, e.g. `email` or `support_tier_id`.
    #[error("unique constraint violated on {0}")]
    UniqueViolation(String),

    /// A referenced row does not exist. Holds the referencing column when the
    /// caller knows it.
    #[error("foreign key constraint violated on {0}")]
    ForeignKeyViolation(String),

    #[error("database lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

impl DbError {
    /// Names the referencing column of a foreign key failure. SQLite does not
    /// report it, so the statement that knows which column it bound does.
    pub fn on_foreign_key(self, column: &str) -> Self {
        match self {
            Self::ForeignKeyViolation(_) => Self::ForeignKeyViolation(column.to_string()),
            other => other,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, message) = &err {
            match code.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return Self::UniqueViolation(unique_column(message.as_deref()));
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return Self::ForeignKeyViolation("unknown".into());
                }
                _ => {}
            }
        }
        Self::Sqlite(err)
    }
}

/// SQLite reports `UNIQUE constraint failed: t.a, t.b`. The last column of
/// each index is the one that identifies the clash (the leading ones scope
/// it), so that is the one reported.
fn unique_column(message: Option<&str>) -> String {
    message
        .and_then(|m| m.rsplit(", ").next())
        .and_then(|last| last.rsplit('.').next())
        .map(|column| column.trim().to_string())
        .unwrap_or_else(|| "unknown".into())
}
