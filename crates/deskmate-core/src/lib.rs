//! deskmate-core: domain logic for the deskmate service.
//!
//! - [`entities`]: SQLite persistence behind per-aggregate store traits.
//! - [`access`]: who may view, edit or send to a chat session.
//! - [`chat`]: session management, message orchestration, reply chunking.
//! - [`ai`]: Gemini/OpenAI adapters behind the [`ai::AiBackend`] trait.
//! - [`changelog`], [`users`], [`auth`]: admin CRUD and credentials.
//! - [`excel`]: photo placement into the report workbook.
//! - [`remote`]: size-capped downloads of user-supplied URLs.
//!
//! Nothing here depends on the HTTP layer; errors surface as [`CoreError`].

pub mod access;
pub mod ai;
pub mod auth;
pub mod changelog;
pub mod chat;
pub mod entities;
pub mod error;
pub mod excel;
pub mod pagination;
pub mod persona;
pub mod remote;
pub mod users;

pub use error::{CoreError, CoreResult, FieldErrors};
pub use persona::Persona;
