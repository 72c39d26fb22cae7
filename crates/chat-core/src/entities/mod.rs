//! Domain entities - core business objects

mod message;
mod moderation;
mod profile;
mod reaction;

pub use message::{DeliveryStatus, MediaAttachment, MediaKind, Message, ReplyRef};
pub use moderation::{PinnedRef, ReportEntry, PINNED_SLOT};
pub use profile::{ModeratorOverride, Profile};
pub use reaction::{ReactionCount, ReactionLedger, ReactionSummary};
