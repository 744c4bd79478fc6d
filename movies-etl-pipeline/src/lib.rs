//! # Movies ETL Pipeline
//!
//! This crate provides the pipeline that keeps the search indices in sync
//! with the relational movies source.
//!
//! ## Architecture
//!
//! The pipeline follows the Extractor-Transformer-Loader pattern:
//!
//! 1. **Extractor**: Finds rows changed since a table's watermark and fetches
//!    the films (and persons/genres) they affect
//! 2. **Transformer**: Folds flat join rows into denormalized documents
//! 3. **Loader**: Bulk-upserts documents into the search index
//! 4. **Orchestrator**: Runs the per-table cycle and advances watermarks
//!
//! Every network call goes through a [`RetryPolicy`].

pub mod errors;
pub mod extractor;
pub mod loader;
pub mod orchestrator;
pub mod retry;
pub mod state;
pub mod transformer;

#[cfg(test)]
pub(crate) mod test_support;

pub use errors::PipelineError;
pub use retry::RetryPolicy;
