//! Structured post content.
//!
//! Post bodies are stored as an ordered block document rather than raw
//! markup. Derived views (plain text, media references, read time) are
//! computed from the same tree so write paths never persist render output.

use serde::{Deserialize, Serialize};

/// Average adult reading speed used for the read-time estimate.
const WORDS_PER_MINUTE: usize = 200;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDocument {
    pub blocks: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Heading {
        level: u8,
        text: String,
    },
    Paragraph {
        text: String,
    },
    Code {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        source: String,
    },
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
    },
    List {
        items: Vec<String>,
    },
}

impl ContentDocument {
    pub fn empty() -> Self {
        Self { blocks: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Flatten the document into whitespace-joined prose.
    ///
    /// Code blocks are excluded: they inflate read-time estimates and add
    /// noise to summarization input.
    pub fn plain_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for block in &self.blocks {
            match block {
                ContentBlock::Heading { text, .. } | ContentBlock::Paragraph { text } => {
                    parts.push(text);
                }
                ContentBlock::List { items } => {
                    parts.extend(items.iter().map(String::as_str));
                }
                ContentBlock::Code { .. } | ContentBlock::Image { .. } => {}
            }
        }
        parts.join(" ")
    }

    /// Image URLs referenced by the document, first occurrence order,
    /// duplicates removed.
    pub fn media_urls(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut urls = Vec::new();
        for block in &self.blocks {
            if let ContentBlock::Image { url, .. } = block {
                if seen.insert(url.as_str()) {
                    urls.push(url.clone());
                }
            }
        }
        urls
    }

    pub fn word_count(&self) -> usize {
        self.plain_text().split_whitespace().count()
    }

    /// Estimated reading time in whole minutes; an empty document reads in 0.
    pub fn read_time_minutes(&self) -> i32 {
        self.word_count().div_ceil(WORDS_PER_MINUTE) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(blocks: Vec<ContentBlock>) -> ContentDocument {
        ContentDocument { blocks }
    }

    #[test]
    fn plain_text_skips_code_and_images() {
        let document = doc(vec![
            ContentBlock::Heading {
                level: 2,
                text: "Intro".to_string(),
            },
            ContentBlock::Code {
                language: Some("rust".to_string()),
                source: "fn main() {}".to_string(),
            },
            ContentBlock::Image {
                url: "https://cdn.example/a.png".to_string(),
                alt: None,
            },
            ContentBlock::Paragraph {
                text: "Body text".to_string(),
            },
        ]);

        assert_eq!(document.plain_text(), "Intro Body text");
    }

    #[test]
    fn media_urls_dedupe_preserving_order() {
        let document = doc(vec![
            ContentBlock::Image {
                url: "https://cdn.example/b.png".to_string(),
                alt: None,
            },
            ContentBlock::Image {
                url: "https://cdn.example/a.png".to_string(),
                alt: Some("a".to_string()),
            },
            ContentBlock::Image {
                url: "https://cdn.example/b.png".to_string(),
                alt: None,
            },
        ]);

        assert_eq!(
            document.media_urls(),
            vec![
                "https://cdn.example/b.png".to_string(),
                "https://cdn.example/a.png".to_string()
            ]
        );
    }

    #[test]
    fn read_time_rounds_up() {
        let words = vec!["word"; 201].join(" ");
        let document = doc(vec![ContentBlock::Paragraph { text: words }]);
        assert_eq!(document.read_time_minutes(), 2);

        assert_eq!(ContentDocument::empty().read_time_minutes(), 0);
    }

    #[test]
    fn block_serialization_is_tagged() {
        let block = ContentBlock::Code {
            language: Some("rust".to_string()),
            source: "let x = 1;".to_string(),
        };
        let json = serde_json::to_value(&block).expect("serialize");
        assert_eq!(json["type"], "code");
        assert_eq!(json["language"], "rust");

        let round: ContentBlock = serde_json::from_value(json).expect("deserialize");
        assert_eq!(round, block);
    }
}
