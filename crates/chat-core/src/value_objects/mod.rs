//! Value objects - immutable types that represent domain concepts

mod log_path;
mod message_key;
mod patch;
mod user_id;

pub use log_path::{
    LogPath, MESSAGES_PATH, MODERATOR_PROFILES_PATH, PINNED_PATH, REPORTS_PATH,
};
pub use message_key::{KeyGenerator, KeyParseError, MessageKey, PUSH_ALPHABET};
pub use patch::{Patch, PatchOp};
pub use user_id::UserId;
