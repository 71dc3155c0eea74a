//! Axum HTTP server handlers and middleware for the client registry endpoints.

pub mod context;
mod handler_admin_clients;
mod handler_dynamic_clients;
pub mod middleware_admin;
pub mod middleware_cors;
pub mod server;

pub use context::AppState;
pub use server::build_router;
