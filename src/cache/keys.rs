//! Cache key construction.
//!
//! Versioned keys follow `namespace:version:params...`; parameters that are
//! absent are encoded as `-` so every position stays addressable.

use uuid::Uuid;

/// Namespace for public listing pages.
pub const POSTS_LIST_NS: &str = "posts:list";
/// Namespace for rendered post detail entries.
pub const POSTS_DETAIL_NS: &str = "posts:detail";

pub fn list_key(version: u64, limit: u32, cursor: Option<&str>, tag: Option<&str>) -> String {
    format!(
        "{POSTS_LIST_NS}:{version}:{limit}:{}:{}",
        cursor.unwrap_or("-"),
        tag.unwrap_or("-")
    )
}

pub fn detail_key(version: u64, slug: &str) -> String {
    format!("{POSTS_DETAIL_NS}:{version}:{slug}")
}

/// Related-post ID lists are version-independent: relatedness drifts
/// slowly, so these entries live out their full TTL across version bumps.
pub fn related_key(slug: &str, limit: u32) -> String {
    format!("posts:related:{slug}:{limit}")
}

pub fn sync_hash_key(post_id: Uuid) -> String {
    format!("posts:sync-hash:{post_id}")
}
