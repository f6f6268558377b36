//! Read-time rendering of structured post content.
//!
//! Rendering is deferred to the read path: code-block highlighting is the
//! expensive step and write paths should never pay for it. The rendered
//! output is cached by the posts service under the versioned detail key, so
//! the cost is paid once per cache generation.

mod highlight;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use syntect::{html::ClassStyle, parsing::SyntaxSet};
use thiserror::Error;

use crate::domain::content::{ContentBlock, ContentDocument};
use crate::domain::slug::AnchorSlugger;

use highlight::highlight_code;

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

const CLASS_STYLE: ClassStyle = ClassStyle::Spaced;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to highlight `{language}` block: {message}")]
    Highlighting { language: String, message: String },
}

/// One table-of-contents entry, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub level: u8,
    pub text: String,
    pub anchor: String,
}

/// A fully rendered post body plus its heading outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedContent {
    pub html: String,
    pub toc: Vec<TocEntry>,
}

/// Render a content document to HTML with highlighted code blocks and a
/// table of contents derived from the heading structure.
pub fn render_document(document: &ContentDocument) -> Result<RenderedContent, RenderError> {
    let mut html = String::new();
    let mut toc = Vec::new();
    let mut slugger = AnchorSlugger::new();
    let mut heading_index = 0usize;

    for block in &document.blocks {
        match block {
            ContentBlock::Heading { level, text } => {
                heading_index += 1;
                let level = (*level).clamp(1, 6);
                let anchor = slugger
                    .anchor_for(text)
                    .unwrap_or_else(|_| format!("section-{heading_index}"));
                let escaped = ammonia::clean_text(text);
                html.push_str(&format!(
                    "<h{level} id=\"{anchor}\">{escaped}</h{level}>"
                ));
                toc.push(TocEntry {
                    level,
                    text: text.clone(),
                    anchor,
                });
            }
            ContentBlock::Paragraph { text } => {
                html.push_str(&format!("<p>{}</p>", ammonia::clean_text(text)));
            }
            ContentBlock::Code { language, source } => {
                let highlighted =
                    highlight_code(language.as_deref(), source, &SYNTAX_SET, &CLASS_STYLE)?;
                html.push_str(&highlighted);
            }
            ContentBlock::Image { url, alt } => {
                let src = ammonia::clean_text(url);
                let alt = alt.as_deref().map(ammonia::clean_text).unwrap_or_default();
                html.push_str(&format!("<img src=\"{src}\" alt=\"{alt}\">"));
            }
            ContentBlock::List { items } => {
                html.push_str("<ul>");
                for item in items {
                    html.push_str(&format!("<li>{}</li>", ammonia::clean_text(item)));
                }
                html.push_str("</ul>");
            }
        }
    }

    Ok(RenderedContent { html, toc })
}
