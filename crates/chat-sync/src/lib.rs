//! # chat-sync
//!
//! Application layer: keeps a local message window in sync with a shared,
//! multi-writer log and carries out the participant's actions against it.
//!
//! ## Components
//!
//! - **Session**: one open connection; owns every tail subscription
//! - **SyncEngine**: initial fetch, live tail, guarded backward pagination
//! - **Services**: delivery tracking, reactions, composer, moderation, profiles
//! - **HttpMediaUploader**: multipart attachment upload
//!
//! ## Example
//!
//! ```ignore
//! let config = chat_common::AppConfig::from_env()?;
//! let backend = chat_store::build_backend(&config.backend)?;
//! let profiles = Arc::new(ProfileStore::new(
//!     Arc::clone(&backend),
//!     chat_store::profile_cache_for(&config.backend),
//!     PassphraseVerifier::new(config.moderation.passphrase_hash.clone()),
//! ));
//! profiles.join(JoinRequest { display_name: "alice".into(), avatar: None })?;
//!
//! let session = Session::open(backend, profiles)?;
//! let ctx = ChatContext::new(session, config);
//! ctx.engine().initialize(ctx.config().sync.window_size).await?;
//! Composer::new(&ctx).send(SendMessageRequest::text("hello")).await?;
//! ```

pub mod dto;
pub mod engine;
pub mod error;
pub mod services;
pub mod session;
pub mod upload;
pub mod window;

pub use engine::{CompensatedPage, PageOutcome, ScrollCompensation, SyncEngine, Viewport};
pub use error::{SyncError, SyncResult};
pub use services::{
    ChatContext, Composer, DeleteMode, DeliveryTracker, ModerationService, OverrideSave,
    ProfileStore, ReactionService, ToggleOutcome,
};
pub use session::Session;
pub use upload::{parse_upload_response, HttpMediaUploader};
pub use window::{MessageWindow, WindowChange};
