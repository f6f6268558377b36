//! Application services layer.

pub mod error;
pub mod jobs;
pub mod pagination;
pub mod posts;
pub mod render;
pub mod repos;
