use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;

use crate::formats::ProgressRecord;

/// Where reading progress is persisted.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn update_progress(&self, book_id: &str, percentage: u8) -> anyhow::Result<()>;
    async fn get_progress(&self, book_id: &str) -> anyhow::Result<Option<ProgressRecord>>;
}

#[derive(Debug, Clone)]
pub struct LocalFsProgressStore {
    base_dir: PathBuf,
}

impl LocalFsProgressStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn progress_dir(&self) -> PathBuf {
        self.base_dir.join("progress")
    }

    fn record_path(&self, book_id: &str) -> anyhow::Result<PathBuf> {
        ensure_safe_book_id(book_id)?;
        Ok(self.progress_dir().join(format!("{book_id}.json")))
    }
}

#[async_trait]
impl ProgressStore for LocalFsProgressStore {
    async fn update_progress(&self, book_id: &str, percentage: u8) -> anyhow::Result<()> {
        let path = self.record_path(book_id)?;
        let record = ProgressRecord {
            book_id: book_id.to_owned(),
            percentage: percentage.min(100),
            updated_at: Utc::now(),
        };
        write_record(&path, &record)
            .await
            .with_context(|| format!("save progress for {book_id:?}"))
    }

    async fn get_progress(&self, book_id: &str) -> anyhow::Result<Option<ProgressRecord>> {
        let path = self.record_path(book_id)?;
        let Some(record) = read_record(&path)
            .await
            .with_context(|| format!("load progress for {book_id:?}"))?
        else {
            return Ok(None);
        };
        if record.book_id != book_id {
            anyhow::bail!(
                "progress record {} belongs to {:?}, not {book_id:?}",
                path.display(),
                record.book_id
            );
        }
        Ok(Some(record))
    }
}

fn ensure_safe_book_id(book_id: &str) -> anyhow::Result<()> {
    if book_id.trim().is_empty() {
        anyhow::bail!("book id must not be empty");
    }
    if book_id.contains(['/', '\\']) || book_id.contains("..") {
        anyhow::bail!("book id must not contain path separators or '..': {book_id:?}");
    }
    Ok(())
}

/// A missing record file means the book was never saved.
async fn read_record(path: &Path) -> anyhow::Result<Option<ProgressRecord>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("read {}", path.display()));
        }
    };
    let record = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse progress record {}", path.display()))?;
    Ok(Some(record))
}

/// Writes next to the target and renames over it, so readers never see a
/// partial record. The temp file is removed if the rename fails.
async fn write_record(path: &Path, record: &ProgressRecord) -> anyhow::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("record path has no parent: {}", path.display()))?;
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create progress dir {}", dir.display()))?;

    let tmp_path = dir.join(format!(
        ".{}.{}.tmp",
        record.book_id,
        uuid::Uuid::new_v4().simple()
    ));
    let data = serde_json::to_vec_pretty(record).context("serialize progress record")?;
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write {}", tmp_path.display()))?;
    if let Err(err) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err).with_context(|| format!("replace {}", path.display()));
    }
    Ok(())
}
