//! Sync engine
//!
//! Keeps the message window consistent with the log: one bounded initial
//! fetch, a live tail subscription, and guarded backward pagination.

mod sync_engine;
mod viewport;

pub use sync_engine::{PageOutcome, SyncEngine};
pub use viewport::{CompensatedPage, ScrollCompensation, Viewport};
