use std::path::Path;

use anyhow::Context as _;
use pulldown_cmark::{Options, Parser};

/// Reads book content; Markdown (flagged, or a `.md` file) is rendered to HTML.
pub fn read_book(path: &Path, markdown: bool) -> anyhow::Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read book content: {}", path.display()))?;

    let is_markdown = markdown
        || path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("md"));
    if !is_markdown {
        return Ok(raw);
    }

    tracing::debug!(path = %path.display(), "rendering markdown input");
    Ok(markdown_to_html(&raw))
}

pub fn markdown_to_html(md: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);

    let parser = Parser::new_ext(md, options);
    let mut html = String::with_capacity(md.len() * 3 / 2);
    pulldown_cmark::html::push_html(&mut html, parser);
    html
}
