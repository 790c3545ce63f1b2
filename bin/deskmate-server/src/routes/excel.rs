//! Excel photo-report endpoints.
//!
//! 1. `POST /excel/copy-template` creates a fresh output workbook.
//! 2. `POST /excel/process-photos` (or `/async`) fills its photo slots.
//! 3. `GET /excel/download/{file}` returns the result.

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use deskmate_core::excel::{
    CopyResult, JobAccepted, JobProgress, JobStatus, OutputFile, PhotoUpload, PlacedPhoto,
    PlacementReport, ProcessRequest, SkippedPhoto, XLSX_MIME,
};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::excel::{CopyTemplateQuery, JobStatusResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        copy_template,
        process_photos,
        process_photos_async,
        get_progress,
        job_status,
        cancel_job,
        download,
        list_files,
    ),
    components(schemas(
        CopyResult,
        PlacementReport,
        PlacedPhoto,
        SkippedPhoto,
        JobAccepted,
        JobProgress,
        JobStatus,
        JobStatusResponse,
        OutputFile,
    ))
)]
pub struct ExcelApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/copy-template", post(copy_template))
        .route("/process-photos", post(process_photos))
        .route("/process-photos/async", post(process_photos_async))
        .route("/progress/{id}", get(get_progress))
        .route("/jobs/{id}/status", get(job_status))
        .route("/jobs/{id}/cancel", post(cancel_job))
        .route("/download/{file}", get(download))
        .route("/files", get(list_files))
}

/// Read the `process-photos` multipart form. Photos are `photos` or
/// `photos[]` files; URLs are `photo_urls` or `photo_urls[]` text fields.
async fn read_process_form(mut multipart: Multipart) -> Result<ProcessRequest, ServerError> {
    let mut req = ProcessRequest::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default();
        let base = name.split('[').next().unwrap_or_default().to_owned();
        match base.as_str() {
            "output_file" => req.output_file = field.text().await?.trim().to_owned(),
            "operation_id" => {
                let id = field.text().await?.trim().to_owned();
                if !id.is_empty() {
                    req.operation_id = Some(id);
                }
            }
            "photo_urls" => {
                let url = field.text().await?.trim().to_owned();
                if !url.is_empty() {
                    req.photo_urls.push(url);
                }
            }
            "photos" => {
                let original_name = field.file_name().unwrap_or("photo").to_owned();
                let mime = field.content_type().unwrap_or("application/octet-stream").to_owned();
                let data = field.bytes().await?;
                if !data.is_empty() {
                    req.photos.push(PhotoUpload { original_name, mime, data });
                }
            }
            _ => {}
        }
    }
    Ok(req)
}

#[utoipa::path(
    post,
    path = "/excel/copy-template",
    tag = "excel",
    security(("bearer" = [])),
    params(CopyTemplateQuery),
    responses(
        (status = 200, description = "Template copied without its old pictures", body = CopyResult),
        (status = 404, description = "Template file missing"),
    )
)]
pub async fn copy_template(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CopyTemplateQuery>,
) -> Result<Json<CopyResult>, ServerError> {
    Ok(Json(state.excel.copy_template(query.operation_id.as_deref()).await?))
}

#[utoipa::path(
    post,
    path = "/excel/process-photos",
    tag = "excel",
    security(("bearer" = [])),
    request_body(content_type = "multipart/form-data", description = "`output_file`, `photos[]`, `photo_urls[]`, optional `operation_id`"),
    responses(
        (status = 200, description = "Photos placed", body = PlacementReport),
        (status = 404, description = "Output file missing"),
        (status = 408, description = "Time budget nearly exhausted; send fewer photos"),
        (status = 422, description = "Invalid batch"),
    )
)]
pub async fn process_photos(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<PlacementReport>, ServerError> {
    let req = read_process_form(multipart).await?;
    Ok(Json(state.excel.process(req).await?))
}

#[utoipa::path(
    post,
    path = "/excel/process-photos/async",
    tag = "excel",
    security(("bearer" = [])),
    request_body(content_type = "multipart/form-data", description = "Same form as the synchronous variant"),
    responses(
        (status = 202, description = "Job queued", body = JobAccepted),
        (status = 422, description = "Invalid batch"),
    )
)]
pub async fn process_photos_async(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(axum::http::StatusCode, Json<JobAccepted>), ServerError> {
    let req = read_process_form(multipart).await?;
    let accepted = state.excel.start_job(req).await?;
    Ok((axum::http::StatusCode::ACCEPTED, Json(accepted)))
}

#[utoipa::path(
    get,
    path = "/excel/progress/{id}",
    tag = "excel",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Operation or job id")),
    responses(
        (status = 200, description = "Latest progress record", body = JobProgress),
        (status = 404, description = "No progress recorded (yet)"),
    )
)]
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobProgress>, ServerError> {
    Ok(Json(state.excel.progress(&id).await?))
}

#[utoipa::path(
    get,
    path = "/excel/jobs/{id}/status",
    tag = "excel",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Job id")),
    responses((status = 200, description = "completed, failed, cancelled, running or not_found", body = JobStatusResponse))
)]
pub async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusResponse>, ServerError> {
    let status = state.excel.status(&id).await?;
    Ok(Json(JobStatusResponse { job_id: id, status }))
}

#[utoipa::path(
    post,
    path = "/excel/jobs/{id}/cancel",
    tag = "excel",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "Status after the request; finished jobs are unchanged", body = JobStatusResponse),
        (status = 404, description = "Unknown job"),
    )
)]
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusResponse>, ServerError> {
    let status = state.excel.cancel(&id).await?;
    Ok(Json(JobStatusResponse { job_id: id, status }))
}

#[utoipa::path(
    get,
    path = "/excel/download/{file}",
    tag = "excel",
    security(("bearer" = [])),
    params(("file" = String, Path, description = "Output file name")),
    responses(
        (status = 200, description = "The workbook", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 404, description = "No such file"),
    )
)]
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(file): Path<String>,
) -> Result<Response, ServerError> {
    let path = state.excel.download_path(&file).await?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ServerError::Internal(format!("read {}: {e}", path.display())))?;
    let disposition = format!("attachment; filename=\"{file}\"");
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_owned()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/excel/files",
    tag = "excel",
    security(("bearer" = [])),
    responses((status = 200, description = "Generated workbooks, newest first", body = Vec<OutputFile>))
)]
pub async fn list_files(State(state): State<Arc<AppState>>) -> Result<Json<Vec<OutputFile>>, ServerError> {
    Ok(Json(state.excel.list_files().await?))
}
