//! HTTP and WebSocket surface over the [`Monitor`](crate::monitor::Monitor).

pub mod error;
pub mod handlers;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use handlers::{create_router, API_PREFIX};
pub use state::AppState;
