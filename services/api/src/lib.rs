//! HTTP surface of the tutoring marketplace

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;
