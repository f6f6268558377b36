//! HTTP surface: the public JSON API and the token-guarded admin API.

mod admin;
mod error;
mod public;

pub use admin::{AdminState, build_admin_router};
pub use error::ApiError;
pub use public::{PublicState, build_public_router};
