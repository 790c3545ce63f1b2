//! File-backed progress and result records for photo-placement runs.
//!
//! Writers and readers share nothing but the files. Every write goes to a
//! temp file first and is renamed into place, so a reader sees either the
//! previous record or the new one. Cancellation is a separate marker file
//! that progress writes never touch, so a step recorded concurrently with a
//! cancel cannot undo it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use utoipa::ToSchema;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobProgress {
    pub step: String,
    pub current: u32,
    pub total: u32,
    pub percentage: u32,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobResult {
    pub success: bool,
    pub output_file: String,
    pub download_url: String,
    pub placed: u32,
    pub skipped: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

pub fn percentage(current: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    ((u64::from(current.min(total)) * 100 + u64::from(total) / 2) / u64::from(total)) as u32
}

/// Operation and job ids end up in file names.
pub fn is_valid_id(id: &str) -> bool {
    (1..=64).contains(&id.len()) && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[derive(Debug, Clone)]
pub struct ProgressTracker {
    dir: PathBuf,
}

impl ProgressTracker {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn checked(id: &str) -> CoreResult<()> {
        if is_valid_id(id) {
            Ok(())
        } else {
            Err(CoreError::NotFound(format!("job {id}")))
        }
    }

    fn progress_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("job_progress_{id}.json"))
    }

    fn result_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("job_result_{id}.json"))
    }

    fn cancel_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("job_cancel_{id}.json"))
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> CoreResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let body = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> CoreResult<Option<T>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unreadable progress file");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Record a step. A cancelled job stays cancelled.
    pub async fn record(&self, id: &str, step: &str, current: u32, total: u32, message: impl Into<String>) -> CoreResult<JobProgress> {
        Self::checked(id)?;
        let status = if self.is_cancelled(id).await { JobStatus::Cancelled } else { JobStatus::Running };
        let progress = JobProgress {
            step: step.to_owned(),
            current,
            total,
            percentage: percentage(current, total),
            message: message.into(),
            timestamp: Utc::now(),
            status,
        };
        self.write_json(&self.progress_path(id), &progress).await?;
        tracing::debug!(job_id = %id, step, current, total, "progress recorded");
        Ok(progress)
    }

    /// Write the terminal result and mark the progress record accordingly.
    pub async fn finish(&self, id: &str, result: &JobResult) -> CoreResult<()> {
        Self::checked(id)?;
        self.write_json(&self.result_path(id), result).await?;
        if let Some(mut progress) = self.progress(id).await? {
            if progress.status != JobStatus::Cancelled {
                progress.status = if result.success { JobStatus::Completed } else { JobStatus::Failed };
                progress.timestamp = Utc::now();
                self.write_json(&self.progress_path(id), &progress).await?;
            }
        }
        Ok(())
    }

    /// The stored progress record, reported as cancelled once the marker
    /// exists.
    pub async fn progress(&self, id: &str) -> CoreResult<Option<JobProgress>> {
        if !is_valid_id(id) {
            return Ok(None);
        }
        let mut progress: Option<JobProgress> = Self::read_json(&self.progress_path(id)).await?;
        if let Some(p) = progress.as_mut() {
            if p.status != JobStatus::Cancelled && self.is_cancelled(id).await {
                p.status = JobStatus::Cancelled;
            }
        }
        Ok(progress)
    }

    pub async fn result(&self, id: &str) -> CoreResult<Option<JobResult>> {
        if !is_valid_id(id) {
            return Ok(None);
        }
        Self::read_json(&self.result_path(id)).await
    }

    /// Cancelled wins over a result written afterwards; a result wins over
    /// a running progress record.
    pub async fn status(&self, id: &str) -> CoreResult<JobStatus> {
        if self.is_cancelled(id).await {
            return Ok(JobStatus::Cancelled);
        }
        let progress = self.progress(id).await?;
        if let Some(result) = self.result(id).await? {
            return Ok(if result.success { JobStatus::Completed } else { JobStatus::Failed });
        }
        Ok(if progress.is_some() { JobStatus::Running } else { JobStatus::NotFound })
    }

    pub async fn is_cancelled(&self, id: &str) -> bool {
        is_valid_id(id) && tokio::fs::try_exists(self.cancel_path(id)).await.unwrap_or(false)
    }

    /// Flag a running job as cancelled. Finished jobs keep their status.
    pub async fn cancel(&self, id: &str) -> CoreResult<JobStatus> {
        match self.status(id).await? {
            JobStatus::NotFound => Err(CoreError::NotFound(format!("job {id}"))),
            JobStatus::Running => {
                let mut progress = self
                    .progress(id)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("job {id}")))?;
                progress.status = JobStatus::Cancelled;
                progress.message = "Dibatalkan oleh pengguna.".into();
                progress.timestamp = Utc::now();
                self.write_json(&self.cancel_path(id), &progress).await?;
                self.write_json(&self.progress_path(id), &progress).await?;
                tracing::info!(job_id = %id, "job cancellation requested");
                Ok(JobStatus::Cancelled)
            }
            other => Ok(other),
        }
    }
}
