//! Verso - batched, context-aware machine translation
//!
//! Turns sentences and structured documents into model prompts, dispatches them to an
//! interchangeable translation back-end and maps the results back in place.

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod eval;
pub mod language;
pub mod pipeline;
pub mod stage;
pub mod translate;
