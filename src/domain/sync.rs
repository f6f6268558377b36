//! Public snapshot hashing for admin sync-state reporting.
//!
//! The hash covers exactly the fields a public reader can observe. Comparing
//! a freshly computed hash against the one stored at publish time tells the
//! admin surface whether the live caches still reflect the database row,
//! without re-rendering any public page.

use serde::Serialize;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::{content::ContentDocument, entities::PostRecord};

/// Canonical serialization of the publicly-relevant fields of a post.
///
/// Field order is fixed by the struct definition and tag IDs are sorted, so
/// equal public state always produces byte-identical input to the hash.
#[derive(Serialize)]
struct PublicSnapshot<'a> {
    title: &'a str,
    slug: &'a str,
    content: &'a ContentDocument,
    summary: Option<&'a str>,
    tag_ids: Vec<Uuid>,
    published_at: Option<i128>,
    read_time_minutes: i32,
}

/// SHA-256 hex digest over the canonical public snapshot of a post.
pub fn public_content_hash(post: &PostRecord, tag_ids: &[Uuid]) -> String {
    let mut sorted_tags = tag_ids.to_vec();
    sorted_tags.sort();

    let snapshot = PublicSnapshot {
        title: &post.title,
        slug: &post.slug,
        content: &post.content,
        summary: post.summary.as_deref(),
        tag_ids: sorted_tags,
        published_at: post.published_at.map(OffsetDateTime::unix_timestamp_nanos),
        read_time_minutes: post.read_time_minutes,
    };

    let serialized =
        serde_json::to_vec(&snapshot).expect("public snapshot serialization cannot fail");

    let mut hasher = Sha256::new();
    hasher.update(&serialized);
    hex::encode(hasher.finalize())
}

/// Sync verdict for a post given the hash stored at publish time.
///
/// A draft is synced only when no public hash lingers from an earlier
/// published life; a published post is synced when the stored hash matches
/// its current public snapshot.
pub fn is_synced(post: &PostRecord, tag_ids: &[Uuid], stored_hash: Option<&str>) -> bool {
    if post.is_published() {
        match stored_hash {
            Some(stored) => stored == public_content_hash(post, tag_ids),
            None => false,
        }
    } else {
        stored_hash.is_none()
    }
}
