//! `concierge-gateway`: HTTP front end for Concierge.
//!
//! Serves the responder endpoint, the widget poll and push endpoints, and the
//! authenticated admin panel API over one axum router.

pub mod admin_api;
pub mod auth;
pub mod chat_api;
pub mod error;
pub mod rate_limit;
pub mod server;
pub mod sessions_api;

pub use auth::{hash_password, AdminAuth, DEFAULT_TOKEN_TTL_HOURS};
pub use error::{ApiError, ApiResult};
pub use rate_limit::RateLimiter;
pub use server::{build_router, start_server, GatewayState, ResponderHealth};
