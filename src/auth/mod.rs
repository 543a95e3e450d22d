use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod limiter;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod sessions;
pub mod token;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
