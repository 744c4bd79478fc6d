//! Transformer module for the movies ETL pipeline.
//!
//! Folds flat join rows into denormalized search documents.

mod document_transformer;

pub use document_transformer::DocumentTransformer;
