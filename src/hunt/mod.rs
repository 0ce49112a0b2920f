use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::image_routes(state))
        .merge(handlers::stats_routes())
}
