use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Local, Utc};
use image::ImageFormat;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use super::classify::{self, MatchReason, PhotoCandidate};
use super::layout::Layout;
use super::progress::{self, JobProgress, JobResult, JobStatus, ProgressTracker};
use super::workbook::{self, Picture, PictureFormat};
use crate::error::{CoreError, CoreResult, FieldErrors};
use crate::remote::{self, FetchError};

pub const MAX_PHOTOS: usize = 30;
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const TEMPLATE_MISSING: &str = "Template Excel tidak ditemukan.";
pub const BUDGET_EXCEEDED: &str =
    "Waktu pemrosesan hampir habis. Kurangi jumlah foto per batch lalu coba lagi.";
const CANCELLED: &str = "Dibatalkan oleh pengguna.";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

static OUTPUT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+\.xlsx$").expect("static regex"));

/// A photo received as a multipart file.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub original_name: String,
    pub mime: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessRequest {
    /// Name of a previously copied output workbook.
    pub output_file: String,
    pub photos: Vec<PhotoUpload>,
    pub photo_urls: Vec<String>,
    /// Progress file id for synchronous runs.
    pub operation_id: Option<String>,
}

impl ProcessRequest {
    fn total(&self) -> usize {
        self.photos.len() + self.photo_urls.len()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CopyResult {
    pub output_file: String,
    pub download_url: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlacedPhoto {
    pub source: String,
    pub slot: String,
    pub label: String,
    /// `keyword`, `orientation` or `first_free`.
    pub matched_by: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SkippedPhoto {
    pub source: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlacementReport {
    pub output_file: String,
    pub download_url: String,
    pub placed: Vec<PlacedPhoto>,
    pub skipped: Vec<SkippedPhoto>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OutputFile {
    pub name: String,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
    pub download_url: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobAccepted {
    pub job_id: String,
    pub status: JobStatus,
}

fn download_url(name: &str) -> String {
    format!("/excel/download/{name}")
}

/// Time left before `deadline`, or `Timeout` once it has passed.
fn budget_left(deadline: Option<Instant>, id: Option<&str>, processed: usize, total: u32) -> CoreResult<Option<Duration>> {
    let Some(deadline) = deadline else {
        return Ok(None);
    };
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        tracing::warn!(operation_id = ?id, processed, total, "photo time budget exhausted");
        return Err(CoreError::Timeout(BUDGET_EXCEEDED.into()));
    }
    Ok(Some(left))
}

fn reason_name(reason: MatchReason) -> &'static str {
    match reason {
        MatchReason::Keyword => "keyword",
        MatchReason::Orientation => "orientation",
        MatchReason::FirstFree => "first_free",
    }
}

/// A decoded photo ready for assignment.
struct LoadedPhoto {
    source: String,
    format: PictureFormat,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

fn decode(source: &str, data: &[u8]) -> Result<LoadedPhoto, String> {
    if data.len() > MAX_PHOTO_BYTES {
        return Err("Ukuran foto melebihi 10 MB.".into());
    }
    let format = match image::guess_format(data) {
        Ok(ImageFormat::Png) => PictureFormat::Png,
        Ok(ImageFormat::Jpeg) => PictureFormat::Jpeg,
        _ => return Err("Foto harus berformat JPG atau PNG.".into()),
    };
    let (width, height) = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .into_dimensions()
        .map_err(|e| format!("Foto tidak dapat dibaca: {e}"))?;
    Ok(LoadedPhoto { source: source.to_owned(), format, width, height, data: data.to_vec() })
}

/// Copies the report template and fills its photo slots.
#[derive(Debug, Clone)]
pub struct PhotoPlacementService {
    template: PathBuf,
    layout: Arc<Layout>,
    outputs: PathBuf,
    progress: ProgressTracker,
    budget: Duration,
    http: reqwest::Client,
}

impl PhotoPlacementService {
    /// Outputs go to `<storage>/excel/outputs`, progress files to
    /// `<storage>/excel/progress`.
    pub fn new(template: impl Into<PathBuf>, layout: Layout, storage_root: &Path, budget: Duration) -> CoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| CoreError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            template: template.into(),
            layout: Arc::new(layout),
            outputs: storage_root.join("excel").join("outputs"),
            progress: ProgressTracker::new(storage_root.join("excel").join("progress")),
            budget,
            http,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Step 1: copy the template to a fresh timestamped output.
    pub async fn copy_template(&self, operation_id: Option<&str>) -> CoreResult<CopyResult> {
        if !tokio::fs::try_exists(&self.template).await.unwrap_or(false) {
            tracing::warn!(template = %self.template.display(), "excel template missing");
            return Err(CoreError::NotFound(TEMPLATE_MISSING.into()));
        }
        if let Some(id) = operation_id {
            self.progress.record(id, "copy_template", 0, 1, "Menyalin template...").await?;
        }
        tokio::fs::create_dir_all(&self.outputs).await?;

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let name = format!("laporan_{}_{}.xlsx", Local::now().format("%Y%m%d_%H%M%S"), &suffix[..6]);
        let dest = self.outputs.join(&name);
        let template = self.template.clone();
        let target = dest.clone();
        tokio::task::spawn_blocking(move || workbook::copy_template(&template, &target))
            .await
            .map_err(|e| CoreError::Internal(format!("copy task: {e}")))??;

        if let Some(id) = operation_id {
            self.progress.record(id, "copy_template", 1, 1, "Template disalin.").await?;
        }
        tracing::info!(output_file = %name, operation_id = ?operation_id, "template copied");
        Ok(CopyResult { download_url: download_url(&name), output_file: name })
    }

    fn validate(&self, req: &ProcessRequest) -> CoreResult<()> {
        let mut errors = FieldErrors::new();
        if !OUTPUT_NAME.is_match(&req.output_file) {
            errors.add("output_file", "Nama file output tidak valid.");
        }
        if req.total() == 0 {
            errors.add("photos", "Minimal satu foto atau URL foto harus dikirim.");
        }
        if req.total() > MAX_PHOTOS {
            errors.add("photos", format!("Maksimal {MAX_PHOTOS} foto per proses."));
        }
        for (idx, photo) in req.photos.iter().enumerate() {
            if !matches!(photo.mime.as_str(), "image/jpeg" | "image/jpg" | "image/png") {
                errors.add(&format!("photos.{idx}"), "Foto harus berformat JPG atau PNG.");
            }
            if photo.data.len() > MAX_PHOTO_BYTES {
                errors.add(&format!("photos.{idx}"), "Ukuran foto maksimal 10 MB.");
            }
        }
        for (idx, url) in req.photo_urls.iter().enumerate() {
            let ok = reqwest::Url::parse(url)
                .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
                .unwrap_or(false);
            if !ok {
                errors.add(&format!("photo_urls.{idx}"), "URL foto harus berupa alamat http atau https yang valid.");
            }
        }
        if let Some(id) = &req.operation_id {
            if !progress::is_valid_id(id) {
                errors.add("operation_id", "ID operasi tidak valid.");
            }
        }
        errors.into_result()
    }

    async fn output_path(&self, name: &str) -> CoreResult<PathBuf> {
        if !OUTPUT_NAME.is_match(name) {
            return Err(CoreError::NotFound(format!("file {name}")));
        }
        let path = self.outputs.join(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            Ok(path)
        } else {
            Err(CoreError::NotFound(format!("File {name} tidak ditemukan.")))
        }
    }

    /// Step 2, synchronously. Aborts with `Timeout` once 90% of the time
    /// budget is spent.
    pub async fn process(&self, req: ProcessRequest) -> CoreResult<PlacementReport> {
        self.validate(&req)?;
        let path = self.output_path(&req.output_file).await?;
        let deadline = Instant::now() + self.budget.mul_f64(0.9);
        let id = req.operation_id.clone();
        match self.run(&req, &path, id.as_deref(), Some(deadline), false).await {
            Ok(Some(report)) => Ok(report),
            Ok(None) => Err(CoreError::BadRequest(CANCELLED.into())),
            Err(e) => {
                tracing::error!(operation_id = ?id, output_file = %req.output_file, error = %e, "photo processing failed");
                Err(e)
            }
        }
    }

    /// Step 2 in the background. Returns the job id immediately; progress
    /// and the final result land in the job's files.
    pub async fn start_job(&self, req: ProcessRequest) -> CoreResult<JobAccepted> {
        self.validate(&req)?;
        let path = self.output_path(&req.output_file).await?;
        let job_id = uuid::Uuid::new_v4().simple().to_string();
        self.progress
            .record(&job_id, "queued", 0, req.total() as u32, "Menunggu diproses...")
            .await?;

        tracing::info!(job_id = %job_id, output_file = %req.output_file, "photo job queued");
        let service = self.clone();
        let id = job_id.clone();
        tokio::spawn(async move {
            let outcome = service.run(&req, &path, Some(&id), None, true).await;
            let result = match outcome {
                Ok(Some(report)) => JobResult {
                    success: true,
                    download_url: report.download_url,
                    output_file: report.output_file,
                    placed: report.placed.len() as u32,
                    skipped: report.skipped.len() as u32,
                    error: None,
                    completed_at: Utc::now(),
                },
                Ok(None) => service.failed_result(&req.output_file, CANCELLED),
                Err(e) => {
                    tracing::error!(job_id = %id, output_file = %req.output_file, error = %e, "photo job failed");
                    service.failed_result(&req.output_file, "Pemrosesan foto gagal.")
                }
            };
            if let Err(e) = service.progress.finish(&id, &result).await {
                tracing::error!(job_id = %id, error = %e, "failed to write job result");
            }
        });
        Ok(JobAccepted { job_id, status: JobStatus::Running })
    }

    fn failed_result(&self, output_file: &str, error: &str) -> JobResult {
        JobResult {
            success: false,
            output_file: output_file.to_owned(),
            download_url: download_url(output_file),
            placed: 0,
            skipped: 0,
            error: Some(error.to_owned()),
            completed_at: Utc::now(),
        }
    }

    /// Shared worker. `Ok(None)` means the job was cancelled.
    async fn run(
        &self,
        req: &ProcessRequest,
        path: &Path,
        progress_id: Option<&str>,
        deadline: Option<Instant>,
        cancellable: bool,
    ) -> CoreResult<Option<PlacementReport>> {
        let total = req.total() as u32;

        let sources = req
            .photos
            .iter()
            .map(|p| (p.original_name.clone(), Some(p.data.clone())))
            .chain(req.photo_urls.iter().map(|u| (u.clone(), None)));

        let mut loaded = Vec::new();
        let mut skipped = Vec::new();
        for (idx, (source, data)) in sources.enumerate() {
            if let Some(id) = progress_id.filter(|_| cancellable) {
                if self.progress.is_cancelled(id).await {
                    tracing::info!(job_id = %id, processed = idx, "photo job cancelled");
                    return Ok(None);
                }
            }
            let remaining = budget_left(deadline, progress_id, idx, total)?;

            let bytes = match data {
                Some(bytes) => Ok(bytes),
                None => self.download(&source, remaining).await,
            };
            match bytes.and_then(|b| decode(&source, &b)) {
                Ok(photo) => loaded.push(photo),
                Err(reason) => {
                    tracing::warn!(operation_id = ?progress_id, source = %source, reason = %reason, "photo skipped");
                    skipped.push(SkippedPhoto { source, reason });
                }
            }
            self.note(progress_id, "load_photos", idx as u32 + 1, total, format!("Memuat foto {} dari {total}", idx + 1)).await?;
        }

        let candidates: Vec<PhotoCandidate> = loaded
            .iter()
            .map(|p| PhotoCandidate { name: p.source.clone(), width: p.width, height: p.height })
            .collect();
        let assignment = classify::assign(&self.layout.slots, &candidates);

        let mut placed = Vec::with_capacity(assignment.placed.len());
        let mut pictures = Vec::with_capacity(assignment.placed.len());
        for &(photo_idx, slot_idx, reason) in &assignment.placed {
            let photo = &loaded[photo_idx];
            let slot = &self.layout.slots[slot_idx];
            placed.push(PlacedPhoto {
                source: photo.source.clone(),
                slot: slot.key.clone(),
                label: slot.label.clone(),
                matched_by: reason_name(reason).to_owned(),
            });
            pictures.push(Picture {
                sheet: slot.sheet.clone(),
                range: slot.range,
                name: slot.label.clone(),
                format: photo.format,
                data: photo.data.clone(),
            });
        }
        for &photo_idx in &assignment.skipped {
            skipped.push(SkippedPhoto {
                source: loaded[photo_idx].source.clone(),
                reason: "Semua posisi foto pada template sudah terisi.".into(),
            });
        }
        drop(loaded);

        if let Some(id) = progress_id.filter(|_| cancellable) {
            if self.progress.is_cancelled(id).await {
                return Ok(None);
            }
        }
        budget_left(deadline, progress_id, total as usize, total)?;
        self.note(progress_id, "write_workbook", total, total, "Menyimpan foto ke file Excel...").await?;
        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || workbook::insert_pictures(&target, &pictures))
            .await
            .map_err(|e| CoreError::Internal(format!("write task: {e}")))??;

        self.note(progress_id, "done", total, total, format!("Selesai: {} foto ditempatkan, {} dilewati.", placed.len(), skipped.len())).await?;
        tracing::info!(
            operation_id = ?progress_id,
            output_file = %req.output_file,
            placed = placed.len(),
            skipped = skipped.len(),
            "photos placed"
        );
        Ok(Some(PlacementReport {
            download_url: download_url(&req.output_file),
            output_file: req.output_file.clone(),
            placed,
            skipped,
        }))
    }

    async fn note(&self, id: Option<&str>, step: &str, current: u32, total: u32, message: impl Into<String>) -> CoreResult<()> {
        if let Some(id) = id {
            self.progress.record(id, step, current, total, message).await?;
        }
        Ok(())
    }

    /// Fetch a photo URL within `remaining` of the time budget.
    async fn download(&self, url: &str, remaining: Option<Duration>) -> Result<Bytes, String> {
        let timeout = remaining.map(|r| r.min(DOWNLOAD_TIMEOUT));
        match remote::get_capped(&self.http, url, MAX_PHOTO_BYTES, timeout).await {
            Ok(fetched) => Ok(fetched.bytes),
            Err(FetchError::TooLarge { .. }) => Err("Ukuran foto melebihi 10 MB.".into()),
            Err(e) => Err(format!("Gagal mengunduh foto: {e}")),
        }
    }

    pub async fn status(&self, job_id: &str) -> CoreResult<JobStatus> {
        self.progress.status(job_id).await
    }

    pub async fn progress(&self, id: &str) -> CoreResult<JobProgress> {
        self.progress
            .progress(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("progress {id}")))
    }

    pub async fn cancel(&self, job_id: &str) -> CoreResult<JobStatus> {
        self.progress.cancel(job_id).await
    }

    /// Step 3: resolve a generated workbook for download.
    pub async fn download_path(&self, name: &str) -> CoreResult<PathBuf> {
        self.output_path(name).await
    }

    /// Generated workbooks, newest first.
    pub async fn list_files(&self) -> CoreResult<Vec<OutputFile>> {
        let mut dir = match tokio::fs::read_dir(&self.outputs).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !OUTPUT_NAME.is_match(&name) {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let modified_at = meta.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
            files.push(OutputFile { download_url: download_url(&name), name, size: meta.len(), modified_at });
        }
        files.sort_by(|a, b| b.modified_at.cmp(&a.modified_at).then_with(|| b.name.cmp(&a.name)));
        Ok(files)
    }
}
