use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterMarker {
    pub offset: usize,
    pub number: u32,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub index: usize,
    pub html: String,
    pub word_count: usize,
    pub is_chapter_start: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_index: Option<usize>,
    pub reading_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationResult {
    pub pages: Vec<Page>,
    pub total_pages: usize,
    pub total_words: usize,
    pub average_words_per_page: f64,
    pub chapters: Vec<ChapterMarker>,
    pub words_per_minute: u32,
}

impl PaginationResult {
    /// Word total of the first `pages_read` pages.
    pub fn words_through(&self, pages_read: usize) -> usize {
        self.pages
            .iter()
            .take(pages_read)
            .map(|page| page.word_count)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub percentage: u8,
    pub pages_read: usize,
    pub pages_remaining: usize,
    pub words_read: usize,
    pub words_remaining: usize,
    pub estimated_minutes_remaining: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub book_id: String,
    pub percentage: u8,
    pub updated_at: DateTime<Utc>,
}
