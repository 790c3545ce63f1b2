//! Excel photo-report generation.
//!
//! A run copies the report template without its old pictures, assigns each
//! photo to a placeholder slot and writes the pictures into the copy.

pub mod classify;
pub mod layout;
pub mod progress;
pub mod service;
pub mod workbook;

pub use classify::{Assignment, MatchReason, PhotoCandidate};
pub use layout::{CellRange, Layout, Orientation, Slot};
pub use progress::{JobProgress, JobResult, JobStatus, ProgressTracker};
pub use service::{
    CopyResult, JobAccepted, OutputFile, PhotoPlacementService, PhotoUpload, PlacedPhoto,
    PlacementReport, ProcessRequest, SkippedPhoto, XLSX_MIME,
};
pub use workbook::WorkbookError;
