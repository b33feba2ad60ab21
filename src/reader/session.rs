use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::cache::PaginationCache;
use crate::config::ReaderConfig;
use crate::formats::{Page, PaginationResult, ReadingProgress};
use crate::progress::{calculate_progress, page_for_percentage};
use crate::reader::autosave::Autosave;
use crate::reader::store::ProgressStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Loading,
    Ready,
    Transitioning,
}

/// One open book. Owns its pagination and the autosave task.
#[derive(Debug)]
pub struct ReaderSession {
    book_id: String,
    config: ReaderConfig,
    cache: PaginationCache,
    pagination: Option<Arc<PaginationResult>>,
    current_page: usize,
    state: watch::Sender<SessionState>,
    progress: watch::Sender<ReadingProgress>,
    autosave: Option<Autosave>,
}

impl ReaderSession {
    pub fn open(book_id: impl Into<String>, config: ReaderConfig) -> Self {
        let book_id = book_id.into();
        tracing::debug!(book_id = %book_id, "reader session opened");
        let (state, _) = watch::channel(SessionState::Loading);
        let (progress, _) = watch::channel(ReadingProgress::default());
        Self {
            book_id,
            cache: PaginationCache::new(config.cache_capacity),
            config,
            pagination: None,
            current_page: 0,
            state,
            progress,
            autosave: None,
        }
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<ReadingProgress> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> ReadingProgress {
        *self.progress.borrow()
    }

    pub fn pagination(&self) -> Option<&Arc<PaginationResult>> {
        self.pagination.as_ref()
    }

    /// 1-based; `0` until content is loaded.
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page(&self) -> Option<&Page> {
        let pagination = self.pagination.as_ref()?;
        pagination.pages.get(self.current_page.checked_sub(1)?)
    }

    /// Paginates `content` (memoized) and lands on page 1. Reloading the
    /// same content keeps the current page.
    pub fn load(&mut self, content: &str) -> Arc<PaginationResult> {
        self.state.send_replace(SessionState::Loading);
        let result = self
            .cache
            .get_or_paginate(content, &self.config.pagination);

        let unchanged = self
            .pagination
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &result));
        if !unchanged {
            self.current_page = 1;
        }
        self.pagination = Some(Arc::clone(&result));
        self.publish_progress();
        self.state.send_replace(SessionState::Ready);

        tracing::debug!(
            book_id = %self.book_id,
            pages = result.total_pages,
            reloaded = unchanged,
            "content loaded"
        );
        result
    }

    /// Moves to `page` (clamped to the book). Returns `None` before `load`.
    pub async fn go_to(&mut self, page: usize) -> Option<ReadingProgress> {
        let total = self.pagination.as_ref()?.total_pages;
        let target = page.clamp(1, total);
        if target == self.current_page {
            return Some(self.progress());
        }

        self.state.send_replace(SessionState::Transitioning);
        let delay = self.config.transition_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.current_page = target;
        let progress = self.publish_progress();
        self.state.send_replace(SessionState::Ready);
        Some(progress)
    }

    pub async fn next_page(&mut self) -> Option<ReadingProgress> {
        self.go_to(self.current_page.saturating_add(1)).await
    }

    pub async fn previous_page(&mut self) -> Option<ReadingProgress> {
        self.go_to(self.current_page.saturating_sub(1)).await
    }

    /// Jumps to the page matching the stored percentage, if any.
    pub async fn resume_from(
        &mut self,
        store: &dyn ProgressStore,
    ) -> anyhow::Result<Option<ReadingProgress>> {
        let Some(total) = self.pagination.as_ref().map(|p| p.total_pages) else {
            return Ok(None);
        };
        let Some(record) = store.get_progress(&self.book_id).await? else {
            return Ok(None);
        };
        let page = page_for_percentage(record.percentage, total);
        tracing::debug!(book_id = %self.book_id, percentage = record.percentage, page, "resuming");
        Ok(self.go_to(page).await)
    }

    /// Starts periodic saves; a running autosave is left as is.
    pub fn start_autosave(&mut self, store: Arc<dyn ProgressStore>) {
        if self.autosave.as_ref().is_some_and(Autosave::is_running) {
            return;
        }
        self.autosave = Some(Autosave::spawn(
            store,
            self.book_id.clone(),
            self.progress.subscribe(),
            self.config.autosave_interval(),
        ));
    }

    pub async fn close(mut self) {
        if let Some(autosave) = self.autosave.take() {
            autosave.shutdown().await;
        }
        tracing::debug!(book_id = %self.book_id, page = self.current_page, "reader session closed");
    }

    fn publish_progress(&self) -> ReadingProgress {
        let progress = self
            .pagination
            .as_ref()
            .map(|p| calculate_progress(self.current_page, p))
            .unwrap_or_default();
        self.progress.send_replace(progress);
        progress
    }
}
