//! Domain error type shared by every deskmate-core service.
//!
//! The HTTP layer maps each variant to a status code; nothing in this crate
//! knows about HTTP.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::excel::workbook::WorkbookError;

/// Field-level validation messages, keyed by request field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(pub BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single failing field.
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// First message overall; used as the top-level summary.
    pub fn first_message(&self) -> Option<&str> {
        self.0
            .values()
            .next()
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// `Err(CoreError::Validation)` when anything was collected.
    pub fn into_result(self) -> Result<(), CoreError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation(self))
        }
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            for err in errs.iter() {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{field} tidak valid ({})", err.code));
                out.add(&field.to_string(), message);
            }
        }
        out
    }
}

/// All errors that can surface from deskmate-core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input failed validation; carries per-field messages.
    #[error("validation failed")]
    Validation(FieldErrors),

    /// The caller is authenticated but not allowed to do this.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Missing or invalid credentials.
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// A wall-clock budget was exhausted before the work finished.
    #[error("timeout: {0}")]
    Timeout(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("workbook error: {0}")]
    Workbook(#[from] WorkbookError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// A UNIQUE constraint hit becomes a validation error on `field`; any
    /// other database error passes through.
    pub fn unique_field(err: sqlx::Error, field: &str, message: &str) -> CoreError {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                tracing::debug!(field, error = %db, "unique constraint rejected write");
                CoreError::Validation(FieldErrors::single(field, message))
            }
            _ => CoreError::Database(err),
        }
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        CoreError::Validation(errors.into())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Internal(format!("json: {e}"))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
