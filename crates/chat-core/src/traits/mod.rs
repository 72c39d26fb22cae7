//! Ports implemented by infrastructure adapters

mod backend;

pub use backend::{
    LogBackend, MediaUploader, ProfileCache, RepoResult, Subscription, SubscriptionId,
};
