//! Request DTOs for the composer, reactions, and profile operations

mod requests;

pub use requests::{
    Attachment, EditMessageRequest, JoinRequest, OverrideRequest, ReactionRequest,
    SendMessageRequest,
};
