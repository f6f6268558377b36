//! Folio: a self-hosted blog content service.
//!
//! The crate is layered the same way the binary is wired: `domain` holds
//! entities and invariants, `application` the service orchestration and
//! persistence contracts, `cache` the versioned TTL store, and `infra` the
//! Postgres, HTTP, and collaborator-client implementations.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
