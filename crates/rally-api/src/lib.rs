pub mod auth;
pub mod credentials;
pub mod error;
pub mod images;
pub mod middleware;
pub mod payload;
pub mod petitions;
pub mod routes;
pub mod support_tiers;
pub mod supporters;
pub mod users;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use routes::router;
