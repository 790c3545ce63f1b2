//! Chat image attachments: validation and on-disk storage.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, FieldErrors};

pub const MAX_IMAGES: usize = 5;
pub const MAX_IMAGE_URLS: usize = 10;
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const ALLOWED_MIME: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub original_name: String,
    pub mime: String,
    pub data: Bytes,
}

/// Image metadata recorded on the user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredImage {
    /// Relative to the storage root, e.g. `chat-images/4/<uuid>.png`.
    pub path: String,
    pub original_name: String,
    pub mime: String,
    pub size: u64,
}

pub(crate) fn validate_uploads(uploads: &[ImageUpload], errors: &mut FieldErrors) {
    if uploads.len() > MAX_IMAGES {
        errors.add("images", format!("Maksimal {MAX_IMAGES} gambar per pesan."));
    }
    for (idx, upload) in uploads.iter().enumerate() {
        let field = format!("images.{idx}");
        if !ALLOWED_MIME.contains(&upload.mime.as_str()) {
            errors.add(&field, "Gambar harus berformat JPG, PNG, GIF, atau WEBP.");
        }
        if upload.data.len() > MAX_IMAGE_BYTES {
            errors.add(&field, "Ukuran gambar maksimal 5 MB.");
        }
    }
}

pub(crate) fn validate_urls(urls: &[String], errors: &mut FieldErrors) {
    if urls.len() > MAX_IMAGE_URLS {
        errors.add("image_urls", format!("Maksimal {MAX_IMAGE_URLS} URL gambar per pesan."));
    }
    for (idx, raw) in urls.iter().enumerate() {
        let ok = reqwest::Url::parse(raw)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .unwrap_or(false);
        if !ok {
            errors.add(&format!("image_urls.{idx}"), "URL gambar harus berupa alamat http atau https yang valid.");
        }
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// `true` for bare stored file names like `<uuid>.png`.
fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Filesystem layout for chat uploads under the storage root.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self { root: storage_root.into() }
    }

    fn session_dir(&self, session_id: i64) -> PathBuf {
        self.root.join("chat-images").join(session_id.to_string())
    }

    pub async fn save(&self, session_id: i64, upload: &ImageUpload) -> CoreResult<StoredImage> {
        let dir = self.session_dir(session_id);
        tokio::fs::create_dir_all(&dir).await?;
        let file_name = format!("{}.{}", Uuid::new_v4(), extension_for(&upload.mime));
        tokio::fs::write(dir.join(&file_name), &upload.data).await?;
        Ok(StoredImage {
            path: format!("chat-images/{session_id}/{file_name}"),
            original_name: upload.original_name.clone(),
            mime: upload.mime.clone(),
            size: upload.data.len() as u64,
        })
    }

    /// Read a stored image back by its recorded relative path.
    pub async fn read(&self, stored: &StoredImage) -> CoreResult<Vec<u8>> {
        let rel = Path::new(&stored.path);
        if rel.components().any(|c| !matches!(c, std::path::Component::Normal(_))) {
            return Err(CoreError::BadRequest(format!("invalid image path {}", stored.path)));
        }
        Ok(tokio::fs::read(self.root.join(rel)).await?)
    }

    /// Absolute path of `file_name` inside a session's image directory.
    pub fn locate(&self, session_id: i64, file_name: &str) -> CoreResult<PathBuf> {
        if !is_safe_file_name(file_name) {
            return Err(CoreError::NotFound(format!("image {file_name}")));
        }
        let path = self.session_dir(session_id).join(file_name);
        if !path.is_file() {
            return Err(CoreError::NotFound(format!("image {file_name}")));
        }
        Ok(path)
    }

    /// Best-effort delete of one stored image.
    pub async fn remove(&self, stored: &StoredImage) {
        let rel = Path::new(&stored.path);
        if rel.components().any(|c| !matches!(c, std::path::Component::Normal(_))) {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(self.root.join(rel)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %stored.path, error = %e, "failed to remove chat image");
            }
        }
    }

    pub async fn remove_session(&self, session_id: i64) {
        let dir = self.session_dir(session_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(session_id, path = %dir.display(), error = %e, "failed to remove chat images"),
        }
    }
}
