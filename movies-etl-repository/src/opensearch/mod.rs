//! OpenSearch implementation of the search index provider.
//!
//! The bulk and index APIs used here are wire-compatible with Elasticsearch.

mod client;
mod index_config;

pub use client::OpenSearchClient;
pub use index_config::index_body;
