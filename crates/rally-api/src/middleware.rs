use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

use rally_core::{Decision, rules};
use rally_db::models::UserRow;
use rally_types::models::UserId;

use crate::auth::{AppState, run_blocking};
use crate::error::ApiError;

/// Header carrying the opaque token handed out at login.
pub const TOKEN_HEADER: &str = "x-authorization";

/// Whoever sent the request, if their token is known.
///
/// Extraction never rejects an unknown or missing token; handlers decide
/// whether they need a caller, so that authentication is reported before
/// anything else the handler checks.
pub struct Caller {
    user: Option<UserRow>,
    token: Option<String>,
}

impl Caller {
    pub fn id(&self) -> Option<UserId> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn user_id(&self) -> Decision<UserId> {
        rules::authenticate(self.id())
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/// `X-Authorization: <token>`, or `Authorization: Bearer <token>`.
fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(token.trim().to_string()).filter(|t| !t.is_empty());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = token_from_headers(&parts.headers) else {
            return Ok(Self {
                user: None,
                token: None,
            });
        };

        let lookup = token.clone();
        let user = run_blocking(state, move |s| Ok(s.db.get_user_by_token(&lookup)?)).await?;
        Ok(Self {
            user,
            token: Some(token),
        })
    }
}
