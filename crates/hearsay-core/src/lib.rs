//! Core types, config, errors, conversation history, and knowledge store for Hearsay.

pub mod config;
pub mod error;
pub mod history;
pub mod knowledge;
pub mod types;
