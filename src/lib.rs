//! Subtran - Batched Subtitle Translation
//!
//! Translates SRT subtitle files through an LLM chat-completion API in
//! fixed-size batches, keeping entry count, ids and timing intact.

pub mod cli;
pub mod config;
pub mod error;
pub mod subtitle;
pub mod translate;
pub mod workflow;
