//! Utilities for generating deterministic, human-friendly slugs.
//!
//! The helpers here bridge ASCII slugification (`slug` crate) with Chinese
//! transliteration (`pinyin` crate) so inputs like “基线对齐” become
//! `ji-xian-dui-qi`. Collision handling is numeric: when a base slug is
//! taken, the next slug is `base-(N+1)` where `N` is the highest numeric
//! suffix already in use, so freeing an intermediate suffix never causes a
//! later collision.

use std::collections::HashMap;

use pinyin::{Pinyin, ToPinyin};
use slug::slugify;
use thiserror::Error;

/// Errors that can occur while deriving a slug.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
}

/// Derive a base slug from the provided human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let transliterated = transliterate_to_ascii(input);
    let candidate = slugify(&transliterated);

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Given a taken base slug and every existing slug starting with `base-`,
/// compute the next free numbered variant.
///
/// Only exact `base-<N>` matches participate; `base-draft` or
/// `base-2-copy` are unrelated slugs. With no numbered variant present the
/// first collision yields `base-1`, and gaps are never reused: if `base-5`
/// exists but `base-1..4` do not, the successor is `base-6`.
pub fn numbered_successor(base: &str, existing: &[String]) -> String {
    let max_suffix = existing
        .iter()
        .filter_map(|slug| numeric_suffix(base, slug))
        .max()
        .unwrap_or(0);

    format!("{base}-{}", max_suffix + 1)
}

fn numeric_suffix(base: &str, slug: &str) -> Option<u64> {
    let rest = slug.strip_prefix(base)?.strip_prefix('-')?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// Deterministically generate unique anchor slugs within a single document.
///
/// Headings processed in order receive monotonic suffixes when duplicates
/// occur (e.g. `section`, `section-2`, `section-3`).
#[derive(Default, Debug)]
pub struct AnchorSlugger {
    occurrences: HashMap<String, usize>,
}

impl AnchorSlugger {
    pub fn new() -> Self {
        Self {
            occurrences: HashMap::new(),
        }
    }

    /// Generate a slug for the provided heading text, ensuring uniqueness
    /// within this slugger. Returns an error when the heading cannot produce
    /// a slug (empty or unrepresentable input).
    pub fn anchor_for(&mut self, heading: &str) -> Result<String, SlugError> {
        let base = derive_slug(heading)?;
        let count = self.occurrences.entry(base.clone()).or_insert(0);
        *count += 1;

        if *count == 1 {
            Ok(base)
        } else {
            Ok(format!("{base}-{}", *count))
        }
    }
}

fn transliterate_to_ascii(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => append_pinyin(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            None => {
                // Preserve unhandled characters so slugify can decide how to filter them.
                output.push(ch);
            }
        }
    }

    output
}

fn append_pinyin(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slugs(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn derive_slug_transliterates_chinese() {
        let slug = derive_slug("Rust 基础教程").expect("slug");
        assert_eq!(slug, "rust-ji-chu-jiao-cheng");
    }

    #[test]
    fn derive_slug_rejects_empty_input() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn first_collision_yields_suffix_one() {
        assert_eq!(
            numbered_successor("pattern-library", &slugs(&["pattern-library"])),
            "pattern-library-1"
        );
    }

    #[test]
    fn successor_takes_max_suffix_even_with_gaps() {
        let existing = slugs(&["title", "title-5"]);
        assert_eq!(numbered_successor("title", &existing), "title-6");
    }

    #[test]
    fn successor_ignores_non_numeric_variants() {
        let existing = slugs(&["title", "title-draft", "title-2-copy", "title-3"]);
        assert_eq!(numbered_successor("title", &existing), "title-4");
    }

    #[test]
    fn successor_ignores_longer_bases() {
        // `titled-7` starts with `title` but is a different slug family.
        let existing = slugs(&["title", "titled-7"]);
        assert_eq!(numbered_successor("title", &existing), "title-1");
    }

    #[test]
    fn anchor_slugger_produces_unique_slugs() {
        let mut slugger = AnchorSlugger::new();

        let first = slugger.anchor_for("Overview").expect("slug");
        let second = slugger.anchor_for("Overview").expect("slug");
        let third = slugger.anchor_for("深入理解").expect("slug");

        assert_eq!(first, "overview");
        assert_eq!(second, "overview-2");
        assert_eq!(third, "shen-ru-li-jie");
    }
}
