//! Chat services
//!
//! Each service borrows the shared [`ChatContext`] for the duration of one
//! operation; the profile store lives in the session.

pub mod composer;
pub mod context;
pub mod delivery;
pub mod moderation;
pub mod profile;
pub mod reactions;

pub use composer::{Composer, DeleteMode};
pub use context::ChatContext;
pub use delivery::DeliveryTracker;
pub use moderation::ModerationService;
pub use profile::{OverrideSave, ProfileStore};
pub use reactions::{ReactionService, ToggleOutcome};
