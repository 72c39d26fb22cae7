//! Device-local moderator override caches.

mod file;
mod memory;

pub use file::FileProfileCache;
pub use memory::MemoryProfileCache;
