//! # Movies ETL Repository
//!
//! Traits and implementations for the three external services the ETL talks
//! to: the relational movies source (PostgreSQL), the search index
//! (OpenSearch/Elasticsearch) and the watermark state store (Redis or a local
//! JSON file).

pub mod config;
pub mod decode;
pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod postgres;
pub mod state;
pub mod types;

pub use config::{PostgresConfig, RedisConfig, SearchIndexConfig};
pub use decode::keep_whole_roots;
pub use errors::{IndexError, SourceError, StateError};
pub use interfaces::{MovieSource, SearchIndexProvider, StateStorage};
pub use opensearch::OpenSearchClient;
pub use postgres::PostgresMovieSource;
pub use state::{JsonFileStateStorage, RedisStateStorage};
pub use types::{BulkDocument, BulkItemResult, BulkSummary, ChangeCursor};
