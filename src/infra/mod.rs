//! Infrastructure adapters: Postgres, HTTP, collaborators, telemetry.

pub mod cdn;
pub mod db;
pub mod error;
pub mod http;
pub mod search;
pub mod summary;
pub mod telemetry;
