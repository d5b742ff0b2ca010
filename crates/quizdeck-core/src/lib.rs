//! quizdeck-core: Question cache and quiz session engine.
//!
//! This crate defines the question data model, the corpus index, the chunk
//! cache that sits in front of the durable store, and the quiz session state
//! machine with its timer and statistics.

pub mod cache;
pub mod clock;
pub mod engine;
pub mod error;
pub mod index;
pub mod model;
pub mod parser;
pub mod session;
pub mod statistics;
pub mod store;
pub mod timer;
pub mod traits;

#[cfg(test)]
pub(crate) mod fixtures;
