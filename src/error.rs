//! Non-fatal conditions: logged where they happen, never returned to callers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NonFatal {
    /// Content needed repair before it could be paginated.
    #[error("malformed content: {detail}")]
    MalformedContent { detail: String },

    /// A background progress write failed. The next tick tries again with
    /// whatever progress is current then; this write is not retried.
    #[error("save progress for book {book_id}")]
    ProgressSave {
        book_id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl NonFatal {
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedContent {
            detail: detail.into(),
        }
    }

    pub fn progress_save(book_id: impl Into<String>, source: anyhow::Error) -> Self {
        Self::ProgressSave {
            book_id: book_id.into(),
            source,
        }
    }

    pub fn log(&self) {
        match self {
            Self::MalformedContent { detail } => {
                tracing::debug!(detail = %detail, "content repaired during normalization");
            }
            Self::ProgressSave { book_id, source } => {
                tracing::warn!(book_id = %book_id, err = ?source, "progress save failed");
            }
        }
    }
}
