//! PostgreSQL implementation of the movies source.

pub mod queries;
mod source;

pub use source::PostgresMovieSource;
