//! Data structures for the conversation orchestrator.
//!
//! A conversation is a sequence of immutable [`Turn`]s correlated by a
//! [`SessionId`]. Failures surface as [`ConversationError`] kinds.

pub mod error;
pub mod turn;

pub use error::ConversationError;
pub use turn::{Role, SessionId, Turn};
