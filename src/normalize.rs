//! Cleans imported book content before it is paginated.

use crate::error::NonFatal;

const PAGE_CLASS: &str = "book-page";
const DIV_OPEN: &str = "<div";
const DIV_CLOSE: &str = "</div>";
const PARAGRAPH_BREAK: &str = "</p>\n<p>";

/// Never fails: unknown markup passes through untouched.
pub fn normalize(raw: &str) -> String {
    let unwrapped = strip_page_wrappers(raw);
    let text = unwrapped.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;
    for line in text.split('\n') {
        let line = collapse_inline_whitespace(line);
        if line.is_empty() {
            blank_run += 1;
            continue;
        }

        if !out.is_empty() {
            if blank_run == 0 || (out.ends_with('>') && line.starts_with('<')) {
                out.push('\n');
            } else {
                out.push_str(PARAGRAPH_BREAK);
            }
        }
        out.push_str(&line);
        blank_run = 0;
    }

    if out.is_empty() {
        return out;
    }
    if !starts_with_paragraph(&out) {
        out.insert_str(0, "<p>");
    }
    if !out.ends_with("</p>") {
        out.push_str("</p>");
    }
    out
}

fn strip_page_wrappers(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut opened = 0usize;
    let mut cursor = 0usize;
    while let Some(rel) = raw[cursor..].find(DIV_OPEN) {
        let start = cursor + rel;
        let Some(close_rel) = raw[start..].find('>') else {
            break;
        };
        let end = start + close_rel + 1;
        if is_page_wrapper(&raw[start..end]) {
            out.push_str(&raw[cursor..start]);
            opened += 1;
        } else {
            out.push_str(&raw[cursor..end]);
        }
        cursor = end;
    }
    out.push_str(&raw[cursor..]);

    let mut closed = 0usize;
    while closed < opened {
        let Some(pos) = out.rfind(DIV_CLOSE) else {
            break;
        };
        out.replace_range(pos..pos + DIV_CLOSE.len(), "");
        closed += 1;
    }

    if closed < opened {
        NonFatal::malformed(format!(
            "{opened} page wrapper(s) opened but only {closed} closed"
        ))
        .log();
    }
    out
}

/// A `<div>` whose class list contains `book-page`, whatever its other
/// attributes or quoting.
fn is_page_wrapper(tag: &str) -> bool {
    let Some(attrs) = tag
        .strip_prefix(DIV_OPEN)
        .and_then(|rest| rest.strip_suffix('>'))
    else {
        return false;
    };
    if !attrs.starts_with(|c: char| c.is_ascii_whitespace()) {
        return false;
    }
    class_attribute(attrs)
        .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == PAGE_CLASS))
}

fn class_attribute(attrs: &str) -> Option<&str> {
    let mut cursor = 0usize;
    while let Some(rel) = attrs[cursor..].find("class") {
        let pos = cursor + rel;
        cursor = pos + "class".len();
        if !attrs[..pos].ends_with(|c: char| c.is_ascii_whitespace()) {
            continue;
        }
        let Some(value) = attrs[cursor..].trim_start().strip_prefix('=') else {
            continue;
        };
        let value = value.trim_start();
        return match value.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let body = &value[1..];
                body.find(quote).map(|end| &body[..end])
            }
            _ => value
                .split(|c: char| c.is_ascii_whitespace() || c == '/')
                .next(),
        };
    }
    None
}

fn collapse_inline_whitespace(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for word in line.split([' ', '\t']).filter(|w| !w.is_empty()) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out.trim().to_owned()
}

fn starts_with_paragraph(text: &str) -> bool {
    text.starts_with("<p>") || text.starts_with("<p ")
}

#[cfg(test)]
mod tests {
    use super::normalize;

    #[test]
    fn empty_and_blank_input_stay_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("  \n\t\n  "), "");
    }

    #[test]
    fn plain_text_is_wrapped_in_paragraphs() {
        assert_eq!(normalize("Hello world."), "<p>Hello world.</p>");
    }

    #[test]
    fn blank_lines_become_paragraph_breaks() {
        let raw = "First line.\n\n\n   \nSecond line.";
        assert_eq!(normalize(raw), "<p>First line.</p>\n<p>Second line.</p>");
    }

    #[test]
    fn single_newlines_are_kept() {
        assert_eq!(normalize("a\nb"), "<p>a\nb</p>");
    }

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(
            normalize("  too   many\t\tspaces  \r\n"),
            "<p>too many spaces</p>"
        );
    }

    #[test]
    fn book_page_wrapper_is_removed() {
        let raw = "<div class=\"book-page\"><p>Inside.</p></div>";
        assert_eq!(normalize(raw), "<p>Inside.</p>");
    }

    #[test]
    fn single_quoted_wrapper_is_removed() {
        let raw = "<div class='book-page'>\n<p>One.</p>\n</div>\n";
        assert_eq!(normalize(raw), "<p>One.</p>");
    }

    #[test]
    fn unrelated_divs_survive_wrapper_removal() {
        let raw = "<div class=\"book-page\"><p>a</p><div>b</div></div>";
        assert_eq!(normalize(raw), "<p>a</p><div>b</div></p>");
    }

    #[test]
    fn wrapper_with_extra_attributes_is_removed() {
        let raw = "<div class=\"book-page\" data-x=\"1\"><p>Inside.</p></div>";
        assert_eq!(normalize(raw), "<p>Inside.</p>");

        let raw = "<div  id=p1  class = 'chapter book-page'>\n<p>Two.</p>\n</div>";
        assert_eq!(normalize(raw), "<p>Two.</p>");

        let raw = "<div class=book-page><p>Bare.</p></div>";
        assert_eq!(normalize(raw), "<p>Bare.</p>");
    }

    #[test]
    fn similar_classes_are_not_wrappers() {
        let raw = "<div class=\"book-pages\"><p>a</p></div>";
        assert_eq!(normalize(raw), format!("<p>{raw}</p>"));

        let raw = "<div data-class=\"book-page\"><p>a</p></div>";
        assert_eq!(normalize(raw), format!("<p>{raw}</p>"));

        let raw = "<divider class=\"book-page\">a</divider>";
        assert_eq!(normalize(raw), format!("<p>{raw}</p>"));
    }

    #[test]
    fn unclosed_wrapper_degrades_to_passthrough() {
        let raw = "<div class=\"book-page\">Text without close";
        assert_eq!(normalize(raw), "<p>Text without close</p>");
    }

    #[test]
    fn blank_lines_between_tags_do_not_inject_paragraphs() {
        let raw = "<p>One.</p>\n\n<p>Two.</p>";
        assert_eq!(normalize(raw), "<p>One.</p>\n<p>Two.</p>");
    }

    #[test]
    fn existing_paragraph_with_attributes_is_not_rewrapped() {
        let raw = "<p class=\"x\">Hi.</p>";
        assert_eq!(normalize(raw), raw);
    }
}
