use crate::state::AppState;
use axum::Router;

mod dto;
pub mod extractors;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use dto::MessageResponse;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new().merge(handlers::auth_routes(state))
}
