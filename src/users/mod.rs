use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
mod memory;
pub mod password;
mod repo;
mod repo_types;
pub mod services;

pub use dto::{NewUser, SafeUser, UserUpdate};
pub use memory::MemoryUserService;
pub use services::{PgUserService, ServiceError, ServiceResult, UserService};

pub fn router() -> Router<AppState> {
    Router::new().nest("/user", handlers::user_routes())
}
