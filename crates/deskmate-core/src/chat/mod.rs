//! Chat sessions, message orchestration and reply streaming.

pub mod images;
pub mod service;
pub mod stream;
pub mod templates;

pub use images::{ImageStore, ImageUpload, StoredImage};
pub use service::{
    ChatService, CreateSessionInput, Exchange, PendingTurn, SendMessageInput, SessionDetail,
    SessionView, UpdateSessionInput,
};
pub use stream::{chunk_reply, StreamEvent};
