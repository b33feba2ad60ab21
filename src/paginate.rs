//! Splits normalized book content into reading pages.
//!
//! Content is tokenized into tags, words and whitespace runs that cover the
//! input without gaps, so every page is a contiguous slice and the pages
//! concatenate back to the normalized content. Tags are never split.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::chapters::detect_chapters;
use crate::cli::{OutputFormat, PaginateArgs};
use crate::config::ReaderConfig;
use crate::formats::{ChapterMarker, Page, PaginationResult};
use crate::normalize::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub target_words: usize,
    pub min_words: usize,
    pub max_words: usize,
    pub words_per_minute: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            target_words: 250,
            min_words: 180,
            max_words: 320,
            words_per_minute: 200,
        }
    }
}

impl PaginationConfig {
    pub fn new(
        target_words: usize,
        min_words: usize,
        max_words: usize,
        words_per_minute: u32,
    ) -> anyhow::Result<Self> {
        if min_words == 0 {
            anyhow::bail!("min_words must be at least 1");
        }
        if min_words > target_words || target_words > max_words {
            anyhow::bail!(
                "word bounds must satisfy min <= target <= max (got {min_words} / {target_words} / {max_words})"
            );
        }
        if words_per_minute == 0 {
            anyhow::bail!("words_per_minute must be at least 1");
        }
        Ok(Self {
            target_words,
            min_words,
            max_words,
            words_per_minute,
        })
    }

    /// Clamps the bounds into a usable shape instead of rejecting them.
    pub fn normalized(&self) -> Self {
        let max_words = self.max_words.max(1);
        let target_words = self.target_words.clamp(1, max_words);
        let min_words = self.min_words.clamp(1, target_words);
        Self {
            target_words,
            min_words,
            max_words,
            words_per_minute: self.words_per_minute.max(1),
        }
    }
}

pub fn run(args: PaginateArgs) -> anyhow::Result<()> {
    let input = PathBuf::from(&args.input);
    let content = crate::input::read_book(&input, args.markdown)?;

    let reader_config =
        ReaderConfig::load(args.config.as_deref().map(Path::new)).context("load config")?;
    let base = reader_config.pagination;
    let config = PaginationConfig::new(
        args.target_words.unwrap_or(base.target_words),
        args.min_words.unwrap_or(base.min_words),
        args.max_words.unwrap_or(base.max_words),
        base.words_per_minute,
    )
    .context("pagination flags")?;

    let result = paginate(&content, &config);
    tracing::info!(
        input = %input.display(),
        pages = result.total_pages,
        words = result.total_words,
        chapters = result.chapters.len(),
        "paginated"
    );

    let rendered = match args.format {
        OutputFormat::Json => {
            let mut json =
                serde_json::to_string_pretty(&result).context("serialize pagination json")?;
            json.push('\n');
            json
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(&result).context("serialize pagination yaml")?
        }
    };

    let Some(out) = args.out.as_deref() else {
        std::io::stdout()
            .lock()
            .write_all(rendered.as_bytes())
            .context("write pagination to stdout")?;
        return Ok(());
    };

    let out_path = PathBuf::from(out);
    if out_path.exists() && !args.force {
        anyhow::bail!("pagination output already exists: {}", out_path.display());
    }
    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir: {}", parent.display()))?;
    }

    let mut options = OpenOptions::new();
    options.write(true);
    if args.force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = options
        .open(&out_path)
        .with_context(|| format!("open pagination output: {}", out_path.display()))?;
    file.write_all(rendered.as_bytes())
        .with_context(|| format!("write pagination: {}", out_path.display()))?;
    file.flush().context("flush pagination output")?;

    Ok(())
}

/// Empty content still yields one (empty) page.
pub fn paginate(content: &str, config: &PaginationConfig) -> PaginationResult {
    let config = config.normalized();
    let normalized = normalize(content);
    let chapters = detect_chapters(&normalized);
    let tokens = tokenize(&normalized);
    let breaks = chapter_breaks(&tokens, &normalized, &chapters);
    let spans = split_pages(&tokens, &normalized, &breaks, &config);

    let wpm = config.words_per_minute as usize;
    let mut current_chapter = None;
    let pages = spans
        .iter()
        .enumerate()
        .map(|(index, span)| {
            if span.chapter.is_some() {
                current_chapter = span.chapter;
            }
            let start = tokens.get(span.start).map_or(normalized.len(), |t| t.start);
            let end = tokens.get(span.end).map_or(normalized.len(), |t| t.start);
            Page {
                index,
                html: normalized[start..end].to_owned(),
                word_count: span.words,
                is_chapter_start: span.chapter.is_some(),
                chapter_title: span.chapter.map(|c| chapters[c].title.clone()),
                chapter_index: current_chapter,
                reading_minutes: u32::try_from(span.words.div_ceil(wpm)).unwrap_or(u32::MAX),
            }
        })
        .collect::<Vec<_>>();

    let total_pages = pages.len();
    let total_words = pages.iter().map(|p| p.word_count).sum::<usize>();
    tracing::debug!(total_pages, total_words, "pagination finished");

    PaginationResult {
        total_pages,
        total_words,
        average_words_per_page: total_words as f64 / total_pages as f64,
        pages,
        chapters,
        words_per_minute: config.words_per_minute,
    }
}

/// Word count under the same tokenization the paginator uses.
pub fn count_words(content: &str) -> usize {
    tokenize(content)
        .iter()
        .filter(|t| t.kind == TokenKind::Word)
        .count()
}

/// Byte ranges of every markup tag, in document order.
pub(crate) fn tag_ranges(content: &str) -> Vec<Range<usize>> {
    tokenize(content)
        .into_iter()
        .filter(|t| t.kind == TokenKind::Tag)
        .map(|t| t.start..t.end)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Tag,
    Word,
    Space,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

impl Token {
    fn text<'a>(&self, content: &'a str) -> &'a str {
        &content[self.start..self.end]
    }
}

fn tokenize(content: &str) -> Vec<Token> {
    let bytes = content.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let start = i;
        let kind = if bytes[i] == b'<'
            && looks_like_tag(bytes, i)
            && let Some(rel) = content[i..].find('>')
        {
            i += rel + 1;
            TokenKind::Tag
        } else if bytes[i].is_ascii_whitespace() {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            TokenKind::Space
        } else {
            i += 1;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'<' {
                i += 1;
            }
            TokenKind::Word
        };
        tokens.push(Token {
            kind,
            start,
            end: i,
        });
    }

    tokens
}

fn looks_like_tag(bytes: &[u8], lt: usize) -> bool {
    bytes
        .get(lt + 1)
        .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'/' || *b == b'!')
}

const BLOCK_TAGS: [&str; 16] = [
    "p",
    "div",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "blockquote",
    "li",
    "ul",
    "ol",
    "section",
    "pre",
    "table",
    "article",
];

/// Lowercased element name plus whether the tag closes an element.
fn tag_name(tag: &str) -> (bool, String) {
    let inner = tag.trim_start_matches('<').trim_end_matches('>');
    let (closing, inner) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    let name = inner
        .split(|c: char| c.is_ascii_whitespace() || c == '/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    (closing, name)
}

fn is_line_break(name: &str) -> bool {
    name == "br" || name == "hr"
}

fn is_closing_tag(token: &Token, content: &str) -> bool {
    token.kind == TokenKind::Tag && tag_name(token.text(content)).0
}

fn is_opening_tag(token: &Token, content: &str) -> bool {
    if token.kind != TokenKind::Tag {
        return false;
    }
    let text = token.text(content);
    let (closing, name) = tag_name(text);
    !closing && !text.starts_with("<!") && !is_line_break(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Sentence,
}

fn boundary_after(token: &Token, content: &str) -> Option<Boundary> {
    let text = token.text(content);
    match token.kind {
        TokenKind::Tag => {
            let (closing, name) = tag_name(text);
            let paragraph_end =
                (closing && BLOCK_TAGS.contains(&name.as_str())) || is_line_break(&name);
            paragraph_end.then_some(Boundary::Paragraph)
        }
        TokenKind::Word => {
            let bare = text.trim_end_matches(['"', '\'', '”', '’', ')', ']', '»', '*']);
            bare.ends_with(['.', '!', '?', '…'])
                .then_some(Boundary::Sentence)
        }
        TokenKind::Space => None,
    }
}

/// Token index each chapter's page starts at, paired with the chapter index.
fn chapter_breaks(
    tokens: &[Token],
    content: &str,
    chapters: &[ChapterMarker],
) -> Vec<(usize, usize)> {
    let mut breaks = Vec::with_capacity(chapters.len());
    for (chapter, marker) in chapters.iter().enumerate() {
        let mut at = tokens.partition_point(|t| t.end <= marker.offset);
        if at >= tokens.len() {
            continue;
        }
        while at > 0 {
            let prev = &tokens[at - 1];
            if prev.kind == TokenKind::Space || is_opening_tag(prev, content) {
                at -= 1;
            } else {
                break;
            }
        }
        if breaks.last().is_some_and(|(last, _)| *last >= at) {
            continue;
        }
        breaks.push((at, chapter));
    }
    breaks
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageSpan {
    start: usize,
    end: usize,
    words: usize,
    chapter: Option<usize>,
}

fn split_pages(
    tokens: &[Token],
    content: &str,
    breaks: &[(usize, usize)],
    config: &PaginationConfig,
) -> Vec<PageSpan> {
    let mut spans = Vec::new();
    let mut start = 0usize;
    let mut words = 0usize;
    let mut chapter = None;
    let mut paragraph_fallback: Option<(usize, usize)> = None;
    let mut sentence_fallback: Option<(usize, usize)> = None;
    let mut next_break = 0usize;
    let mut i = 0usize;

    while i < tokens.len() {
        while let Some(&(at, chapter_idx)) = breaks.get(next_break)
            && at < i
        {
            tracing::debug!(
                chapter = chapter_idx,
                token = at,
                "chapter break absorbed by previous page"
            );
            next_break += 1;
        }
        if let Some(&(at, chapter_idx)) = breaks.get(next_break)
            && at == i
        {
            next_break += 1;
            if words > 0 {
                spans.push(PageSpan {
                    start,
                    end: i,
                    words,
                    chapter: chapter.take(),
                });
                start = i;
                words = 0;
            }
            chapter = Some(chapter_idx);
            paragraph_fallback = None;
            sentence_fallback = None;
        }

        let token = &tokens[i];
        if token.kind == TokenKind::Word {
            words += 1;
        }
        i += 1;
        let boundary = boundary_after(token, content);

        if words < config.target_words {
            if words >= config.min_words {
                match boundary {
                    Some(Boundary::Paragraph) => paragraph_fallback = Some((i, words)),
                    Some(Boundary::Sentence) => sentence_fallback = Some((i, words)),
                    None => {}
                }
            }
            continue;
        }

        let cut = if boundary.is_some() {
            Some((i, words))
        } else if words >= config.max_words {
            Some(
                paragraph_fallback
                    .or(sentence_fallback)
                    .unwrap_or((i, words)),
            )
        } else {
            None
        };
        let Some((end, page_words)) = cut else {
            continue;
        };

        let end = absorb_closing_tags(tokens, content, end);
        spans.push(PageSpan {
            start,
            end,
            words: page_words,
            chapter: chapter.take(),
        });
        start = end;
        words = 0;
        paragraph_fallback = None;
        sentence_fallback = None;
        i = end;
    }

    if start < tokens.len() {
        if words == 0
            && chapter.is_none()
            && let Some(last) = spans.last_mut()
        {
            last.end = tokens.len();
        } else {
            spans.push(PageSpan {
                start,
                end: tokens.len(),
                words,
                chapter,
            });
        }
    }
    if spans.is_empty() {
        spans.push(PageSpan {
            start: 0,
            end: tokens.len(),
            words: 0,
            chapter: None,
        });
    }

    spans
}

fn absorb_closing_tags(tokens: &[Token], content: &str, mut end: usize) -> usize {
    while end < tokens.len() && is_closing_tag(&tokens[end], content) {
        end += 1;
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize, word: &str) -> String {
        vec![word; n].join(" ")
    }

    /// `n` sentences of ten words each.
    fn sentences(n: usize) -> String {
        (0..n)
            .map(|_| format!("{} end.", words(9, "word")))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn empty_content_yields_one_empty_page() {
        let result = paginate("", &PaginationConfig::default());
        assert_eq!(result.total_pages, 1);
        assert_eq!(result.pages.len(), 1);
        assert_eq!(result.total_words, 0);
        assert_eq!(result.pages[0].word_count, 0);
        assert_eq!(result.pages[0].html, "");
        assert!(!result.pages[0].is_chapter_start);
    }

    #[test]
    fn markup_without_words_is_a_single_page() {
        let result = paginate("<p></p>", &PaginationConfig::default());
        assert_eq!(result.total_pages, 1);
        assert_eq!(result.pages[0].html, "<p></p>");
    }

    #[test]
    fn short_content_is_one_page() {
        let result = paginate("Just a few words here.", &PaginationConfig::default());
        assert_eq!(result.total_pages, 1);
        assert_eq!(result.total_words, 5);
        assert_eq!(result.pages[0].html, "<p>Just a few words here.</p>");
        assert_eq!(result.pages[0].reading_minutes, 1);
    }

    #[test]
    fn breaks_at_first_sentence_end_after_target() {
        let result = paginate(&sentences(60), &PaginationConfig::default());
        let counts = result.pages.iter().map(|p| p.word_count).collect::<Vec<_>>();
        assert_eq!(counts, vec![250, 250, 100]);
        assert_eq!(result.total_words, 600);
    }

    #[test]
    fn hard_breaks_at_max_without_boundaries() {
        let result = paginate(&words(700, "lorem"), &PaginationConfig::default());
        let counts = result.pages.iter().map(|p| p.word_count).collect::<Vec<_>>();
        assert_eq!(counts, vec![320, 320, 60]);
    }

    #[test]
    fn rolls_back_to_paragraph_boundary_inside_range() {
        let first = words(200, "alpha");
        let second = words(400, "beta");
        let content = format!("<p>{first}</p><p>{second}</p>");
        let result = paginate(&content, &PaginationConfig::default());

        assert_eq!(result.pages[0].word_count, 200);
        assert_eq!(result.pages[0].html, format!("<p>{first}</p>"));
        assert_eq!(result.pages[1].word_count, 320);
    }

    #[test]
    fn prefers_paragraph_over_sentence_fallback() {
        let content = format!(
            "<p>{} x.</p><p>{} y. {}</p>",
            words(189, "a"),
            words(9, "b"),
            words(300, "c")
        );
        let result = paginate(&content, &PaginationConfig::default());
        assert_eq!(result.pages[0].word_count, 190);
    }

    #[test]
    fn rolls_back_to_sentence_when_no_paragraph_in_range() {
        let content = format!("{} x. {}", words(199, "a"), words(150, "b"));
        let result = paginate(&content, &PaginationConfig::default());
        let counts = result.pages.iter().map(|p| p.word_count).collect::<Vec<_>>();
        assert_eq!(counts, vec![200, 150]);
        assert!(result.pages[0].html.ends_with(" x."));
        assert!(result.pages[1].html.starts_with(" b"));
    }

    #[test]
    fn closing_tags_stay_on_the_closing_page() {
        let content = format!("<p><em>{}</em></p><p>after</p>", sentences(25));
        let result = paginate(&content, &PaginationConfig::default());
        assert_eq!(result.total_pages, 2);
        assert!(result.pages[0].html.ends_with("end.</em></p>"));
        assert_eq!(result.pages[1].html, "<p>after</p>");
    }

    #[test]
    fn trailing_markup_merges_into_last_page() {
        let content = format!("{}<p></p>", words(320, "w"));
        let result = paginate(&content, &PaginationConfig::default());
        assert_eq!(result.total_pages, 1);
        assert_eq!(result.pages[0].word_count, 320);
    }

    #[test]
    fn pages_concatenate_to_normalized_content() {
        let raw = format!(
            "<div class=\"book-page\">CHAPTER 1. Start\n\n{}\n\nCHAPTER 2. Next\n\n{}</div>",
            sentences(37),
            words(410, "tail")
        );
        let result = paginate(&raw, &PaginationConfig::default());
        let joined = result
            .pages
            .iter()
            .map(|p| p.html.as_str())
            .collect::<String>();
        assert_eq!(joined, normalize(&raw));
        assert_eq!(result.total_words, count_words(&normalize(&raw)));
    }

    #[test]
    fn chapter_markers_force_page_breaks() {
        let content = format!(
            "CHAPTER 1. Opening\n{}\n\nCHAPTER 2. Closing\n{}",
            words(600, "lorem"),
            words(100, "ipsum")
        );
        let result = paginate(&content, &PaginationConfig::default());

        assert!(result.total_pages >= 3);
        assert_eq!(result.chapters.len(), 2);
        let starts = result
            .pages
            .iter()
            .filter(|p| p.is_chapter_start)
            .collect::<Vec<_>>();
        assert_eq!(starts.len(), 2);
        assert_eq!(starts[0].index, 0);
        assert_eq!(starts[0].chapter_title.as_deref(), Some("CHAPTER 1. Opening"));
        assert!(starts[1].html.contains("<p>CHAPTER 2. Closing"));
        assert_eq!(starts[1].chapter_index, Some(1));

        let before = &result.pages[starts[1].index - 1];
        assert_eq!(before.chapter_index, Some(0));
        assert!(!before.html.contains("CHAPTER 2"));
    }

    #[test]
    fn chapter_in_mid_paragraph_breaks_before_marker() {
        let content = format!("{} CHAPTER 3. Sudden {}", words(50, "a"), words(10, "b"));
        let result = paginate(&content, &PaginationConfig::default());
        assert_eq!(result.total_pages, 2);
        assert_eq!(result.pages[0].word_count, 50);
        assert!(result.pages[1].is_chapter_start);
        assert!(result.pages[1].html.starts_with(" CHAPTER 3."));
    }

    #[test]
    fn chapter_text_inside_markup_is_not_a_break() {
        let content = r#"<p><img alt="CHAPTER 1. fake"> real text</p>"#;
        let result = paginate(content, &PaginationConfig::default());
        assert!(result.chapters.is_empty());
        assert_eq!(result.total_pages, 1);
        assert!(!result.pages[0].is_chapter_start);
        assert_eq!(result.pages[0].chapter_title, None);
    }

    #[test]
    fn chapter_after_absorbed_closing_tag_still_starts_a_page() {
        let content = format!(
            "<p>{} end.</em CHAPTER 1. x> {} CHAPTER 2. Next {}</p>",
            words(249, "a"),
            words(10, "b"),
            words(50, "c")
        );
        let result = paginate(&content, &PaginationConfig::default());

        assert_eq!(result.chapters.len(), 1);
        let counts = result.pages.iter().map(|p| p.word_count).collect::<Vec<_>>();
        assert_eq!(counts, vec![250, 10, 53]);
        assert!(!result.pages[0].is_chapter_start);
        assert!(result.pages[0].html.ends_with("</em CHAPTER 1. x>"));
        assert!(result.pages[2].is_chapter_start);
        assert!(
            result.pages[2]
                .chapter_title
                .as_deref()
                .is_some_and(|t| t.starts_with("CHAPTER 2. Next"))
        );
    }

    #[test]
    fn breaks_behind_the_cursor_do_not_block_later_chapters() {
        let content = "<p>a b.</p><p>c d e.</p>";
        let tokens = tokenize(content);
        assert_eq!(tokens.len(), 12);
        let config = PaginationConfig::new(2, 1, 3, 200).unwrap();
        // Token 4 is the first `</p>`, absorbed into the first page.
        let spans = split_pages(&tokens, content, &[(4, 0), (5, 1)], &config);
        assert_eq!(
            spans,
            vec![
                PageSpan {
                    start: 0,
                    end: 5,
                    words: 2,
                    chapter: None,
                },
                PageSpan {
                    start: 5,
                    end: 12,
                    words: 3,
                    chapter: Some(1),
                },
            ]
        );
    }

    #[test]
    fn word_counts_respect_bounds_except_chapter_and_book_ends() {
        let content = format!(
            "CHAPTER 1. One\n\n{}\n\n{}\n\nCHAPTER 2. Two\n\n{}",
            sentences(43),
            words(333, "mid"),
            sentences(71)
        );
        let config = PaginationConfig::default();
        let result = paginate(&content, &config);

        for (idx, page) in result.pages.iter().enumerate() {
            let last_of_chapter = result
                .pages
                .get(idx + 1)
                .is_none_or(|next| next.is_chapter_start);
            if !last_of_chapter {
                assert!(
                    (config.min_words..=config.max_words).contains(&page.word_count),
                    "page {idx} has {} words",
                    page.word_count
                );
            }
        }
    }

    #[test]
    fn paginate_is_deterministic() {
        let content = format!("CHAPTER 1. A\n\n{}", sentences(90));
        let config = PaginationConfig::default();
        assert_eq!(paginate(&content, &config), paginate(&content, &config));
    }

    #[test]
    fn tags_are_never_split() {
        let content = format!(
            "<p>{}<a href=\"https://example.com/a b c\">link text</a> {}</p>",
            words(249, "w"),
            words(200, "z")
        );
        let result = paginate(&content, &PaginationConfig::default());
        for page in &result.pages {
            assert_eq!(
                page.html.matches('<').count(),
                page.html.matches('>').count(),
                "{}",
                page.html
            );
        }
    }

    #[test]
    fn stray_less_than_is_a_word() {
        assert_eq!(count_words("a < b and c > d"), 7);
        assert_eq!(count_words("<p>one <em>two</em></p>"), 2);
    }

    #[test]
    fn inconsistent_config_is_normalized() {
        let config = PaginationConfig {
            target_words: 500,
            min_words: 0,
            max_words: 100,
            words_per_minute: 0,
        }
        .normalized();
        assert_eq!(config.target_words, 100);
        assert_eq!(config.min_words, 1);
        assert_eq!(config.words_per_minute, 1);
    }

    #[test]
    fn new_rejects_invalid_bounds() {
        assert!(PaginationConfig::new(250, 300, 320, 200).is_err());
        assert!(PaginationConfig::new(250, 0, 320, 200).is_err());
        assert!(PaginationConfig::new(250, 180, 320, 0).is_err());
        assert!(PaginationConfig::new(250, 180, 320, 200).is_ok());
    }

    #[test]
    fn reading_minutes_round_up() {
        let config = PaginationConfig::new(10, 5, 400, 100).unwrap();
        let result = paginate(&words(150, "w"), &config);
        assert_eq!(result.pages[0].reading_minutes, 2);
    }
}
