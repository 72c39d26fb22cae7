//! # chat-core
//!
//! Domain layer containing messages, ordering keys, patches, log events, and the
//! backend ports the sync engine is written against.
//! This crate has zero dependencies on infrastructure (Redis, HTTP, etc.).

pub mod entities;
pub mod error;
pub mod events;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    DeliveryStatus, MediaAttachment, MediaKind, Message, ModeratorOverride, PinnedRef, Profile,
    ReactionCount, ReactionLedger, ReactionSummary, ReplyRef, ReportEntry, PINNED_SLOT,
};
pub use error::DomainError;
pub use events::{LogEntry, LogEvent, LogEventKind};
pub use traits::{
    LogBackend, MediaUploader, ProfileCache, RepoResult, Subscription, SubscriptionId,
};
pub use value_objects::{
    KeyGenerator, KeyParseError, LogPath, MessageKey, Patch, PatchOp, UserId,
};
