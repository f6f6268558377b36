//! Folio cache system.
//!
//! A single-process key/value store with TTL plus per-namespace monotonic
//! version counters. List-style caches embed the namespace version in their
//! keys; bumping the version logically invalidates every entry minted under
//! the old version without enumerating them. Orphaned entries simply age
//! out through their TTL.

mod keys;
mod store;

pub use keys::{
    POSTS_DETAIL_NS, POSTS_LIST_NS, detail_key, list_key, related_key, sync_hash_key,
};
pub use store::CacheStore;
