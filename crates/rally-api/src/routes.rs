use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::{petitions, support_tiers, supporters, users};

/// Every endpoint, mounted under `/api/v1`.
pub fn router(state: AppState) -> Router {
    let body_limit = state.images.max_bytes();

    let user_routes = Router::new()
        .route("/users/register", post(auth::register))
        .route("/users/login", post(auth::login))
        .route("/users/logout", post(auth::logout))
        .route("/users/{id}", get(users::view).patch(users::update))
        .route(
            "/users/{id}/image",
            get(users::get_image)
                .put(users::set_image)
                .delete(users::delete_image),
        );

    let petition_routes = Router::new()
        .route("/petitions", get(petitions::search).post(petitions::create))
        .route("/petitions/categories", get(petitions::categories))
        .route(
            "/petitions/{id}",
            get(petitions::get_petition)
                .patch(petitions::edit)
                .delete(petitions::delete),
        )
        .route(
            "/petitions/{id}/image",
            get(petitions::get_image).put(petitions::set_image),
        )
        .route("/petitions/{id}/supportTiers", put(support_tiers::add))
        .route(
            "/petitions/{id}/supportTiers/{tier_id}",
            patch(support_tiers::edit).delete(support_tiers::delete),
        )
        .route(
            "/petitions/{id}/supporters",
            get(supporters::list).post(supporters::create),
        );

    let api = Router::new().merge(user_routes).merge(petition_routes);

    Router::new()
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
