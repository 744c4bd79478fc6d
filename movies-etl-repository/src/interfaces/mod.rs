//! Interface definitions for the external services.
//!
//! The pipeline depends only on these traits, so every backend can be swapped
//! for an in-memory implementation in tests.

mod movie_source;
mod search_index_provider;
mod state_storage;

pub use movie_source::MovieSource;
pub use search_index_provider::SearchIndexProvider;
pub use state_storage::StateStorage;
