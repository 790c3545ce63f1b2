pub mod changelog;
pub mod history;
pub mod session;
pub mod user;

pub use changelog::{Changelog, ChangelogType, UserChangelogView};
pub use history::{ChatHistory, Sender};
pub use session::{ChatSession, ChatType};
pub use user::{Role, User};
