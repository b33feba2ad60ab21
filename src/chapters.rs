use std::ops::Range;
use std::path::PathBuf;

use anyhow::Context as _;

use crate::cli::ChaptersArgs;
use crate::formats::ChapterMarker;
use crate::paginate::tag_ranges;

const MARKER: &str = "CHAPTER";
const DELIMITERS: [u8; 4] = [b'.', b':', b'-', b')'];

pub fn run(args: ChaptersArgs) -> anyhow::Result<()> {
    let input = PathBuf::from(&args.input);
    let content = crate::input::read_book(&input, args.markdown)?;
    let normalized = crate::normalize::normalize(&content);

    let mut stdout = std::io::stdout().lock();
    for marker in detect_chapters(&normalized) {
        serde_json::to_writer(&mut stdout, &marker).context("serialize chapter marker")?;
        std::io::Write::write_all(&mut stdout, b"\n").context("write newline")?;
    }
    Ok(())
}

/// Finds `CHAPTER <digits><delimiter>` headings in text, never inside tags.
///
/// Numbers are taken as written. Duplicates and out-of-order numbers are
/// returned as separate markers in document order.
pub fn detect_chapters(content: &str) -> Vec<ChapterMarker> {
    let bytes = content.as_bytes();
    let tags = tag_ranges(content);
    let mut markers: Vec<ChapterMarker> = Vec::new();
    let mut cursor = 0usize;

    while let Some(rel) = content[cursor..].find(MARKER) {
        let start = cursor + rel;
        cursor = start + MARKER.len();

        if start > 0 && bytes[start - 1].is_ascii_alphanumeric() {
            continue;
        }
        if inside_tag(&tags, start) {
            continue;
        }

        let mut i = cursor;
        while i < bytes.len() && bytes[i] == b' ' {
            i += 1;
        }
        let digits_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == digits_start || i >= bytes.len() || !DELIMITERS.contains(&bytes[i]) {
            continue;
        }
        let Ok(number) = content[digits_start..i].parse::<u32>() else {
            continue;
        };

        let end = content[start..]
            .find(['<', '>', '\n'])
            .map_or(content.len(), |rel| start + rel);
        let title = content[start..end]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        if let Some(prev) = markers.last()
            && prev.number >= number
        {
            tracing::debug!(
                previous = prev.number,
                number,
                offset = start,
                "chapter numbers are not increasing"
            );
        }

        markers.push(ChapterMarker {
            offset: start,
            number,
            title,
        });
    }

    tracing::debug!(chapters = markers.len(), "chapter detection finished");
    markers
}

fn inside_tag(tags: &[Range<usize>], offset: usize) -> bool {
    let idx = tags.partition_point(|tag| tag.end <= offset);
    tags.get(idx).is_some_and(|tag| tag.start <= offset)
}
