//! Session-level logic for ScoutAI.
//!
//! Ties the narrative normalizer to the chat transcript: a research payload
//! arrives, is validated, normalized, and stored on an assistant message.

pub mod transcript;

pub use transcript::Transcript;
