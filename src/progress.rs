use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;

use crate::cli::ProgressArgs;
use crate::config::ReaderConfig;
use crate::formats::{PaginationResult, ReadingProgress};
use crate::reader::store::{LocalFsProgressStore, ProgressStore};

pub async fn run(args: ProgressArgs) -> anyhow::Result<()> {
    let input = PathBuf::from(&args.input);
    let content = crate::input::read_book(&input, args.markdown)?;
    let config =
        ReaderConfig::load(args.config.as_deref().map(Path::new)).context("load config")?;

    let result = crate::paginate::paginate(&content, &config.pagination);
    if args.page == 0 || args.page > result.total_pages {
        anyhow::bail!(
            "page {} is out of range (book has {} pages)",
            args.page,
            result.total_pages
        );
    }
    let progress = calculate_progress(args.page, &result);

    if let (Some(store_dir), Some(book_id)) = (args.store.as_deref(), args.book_id.as_deref()) {
        let store: Arc<dyn ProgressStore> = Arc::new(LocalFsProgressStore::new(store_dir));
        store
            .update_progress(book_id, progress.percentage)
            .await
            .context("save progress")?;
        tracing::info!(book_id, percentage = progress.percentage, "progress saved");
    }

    let json = serde_json::to_string(&progress).context("serialize progress")?;
    println!("{json}");
    Ok(())
}

/// `round(current / total * 100)`, clamped to `0..=100`.
pub fn percentage(current_page: usize, total_pages: usize) -> u8 {
    if total_pages == 0 {
        return 0;
    }
    let current = current_page.min(total_pages);
    let rounded = (current as f64 / total_pages as f64 * 100.0).round();
    rounded.clamp(0.0, 100.0) as u8
}

/// `current_page` is 1-based; `0` means nothing has been read yet.
pub fn calculate_progress(current_page: usize, result: &PaginationResult) -> ReadingProgress {
    let total = result.total_pages;
    let pages_read = current_page.min(total);
    let words_read = result.words_through(pages_read);
    let words_remaining = result.total_words.saturating_sub(words_read);
    let wpm = result.words_per_minute.max(1) as usize;

    ReadingProgress {
        percentage: percentage(current_page, total),
        pages_read,
        pages_remaining: total - pages_read,
        words_read,
        words_remaining,
        estimated_minutes_remaining: u32::try_from(words_remaining.div_ceil(wpm))
            .unwrap_or(u32::MAX),
    }
}

/// First page whose percentage reaches `target`; always a valid page.
pub fn page_for_percentage(target: u8, total_pages: usize) -> usize {
    if total_pages == 0 {
        return 1;
    }
    let target = target.min(100);
    (1..=total_pages)
        .find(|&page| percentage(page, total_pages) >= target)
        .unwrap_or(total_pages)
}
