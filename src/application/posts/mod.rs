//! The posts service: public reads, admin mutations, and the publish
//! pipeline.

mod commands;
mod queries;
mod service;
mod types;

pub use service::PostsService;
pub use types::{
    AdminPostItem, AdminPostPage, CreatePostCommand, PostDetail, PostError, PostListItem,
    PublishPostCommand, UpdatePostCommand,
};
