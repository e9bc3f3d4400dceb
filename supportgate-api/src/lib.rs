//! Public HTTP surface and tenant-routing middleware (C4, C13).

pub mod admin;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
pub mod tenant_router;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
