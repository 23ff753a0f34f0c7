use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use rally_core::Denial;
use rally_db::DbError;

/// Everything a handler can fail with. Denials become client errors with a
/// reason; everything else is logged and answered with a bare 500.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Denied(#[from] Denial),

    #[error("storage failure: {0}")]
    Db(DbError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UniqueViolation(column) => Self::Denied(Denial::Conflict(camel_case(&column))),
            DbError::ForeignKeyViolation(column) => Self::Denied(Denial::invalid(format!(
                "data/{} does not reference an existing record",
                camel_case(&column)
            ))),
            other => Self::Db(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Denied(denial) => {
                let status = match &denial {
                    Denial::Unauthenticated | Denial::InvalidCredentials(_) => {
                        StatusCode::UNAUTHORIZED
                    }
                    Denial::InvalidInput(_) => StatusCode::BAD_REQUEST,
                    Denial::NotFound(_) => StatusCode::NOT_FOUND,
                    Denial::Forbidden(_) => StatusCode::FORBIDDEN,
                    Denial::Conflict(_) => StatusCode::CONFLICT,
                };
                if matches!(denial, Denial::Forbidden(_) | Denial::Conflict(_)) {
                    warn!("Rejected: {}", denial);
                }
                (status, denial.to_string())
            }
            Self::Db(e) => {
                error!("Storage error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".into())
            }
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".into())
            }
        };
        (status, message).into_response()
    }
}

/// `support_tier_id` -> `supportTierId`, matching the JSON field names.
fn camel_case(column: &str) -> String {
    let mut out = String::with_capacity(column.len());
    let mut upper = false;
    for c in column.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
