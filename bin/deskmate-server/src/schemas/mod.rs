//! Request and response bodies that exist only at the HTTP boundary.
//!
//! Domain types from deskmate-core are returned directly where they already
//! derive `ToSchema`.

pub mod auth;
pub mod chat;
pub mod common;
pub mod excel;
