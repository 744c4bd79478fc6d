//! # Movies ETL
//!
//! Main library for the movies Postgres-to-search ETL.
//!
//! This crate provides the entry point, settings and logging setup for
//! running the sync pipeline.

pub mod config;
pub mod telemetry;

pub use config::{Dependencies, Settings};
pub use telemetry::{LogFormat, Telemetry};

use thiserror::Error;

/// Errors that can occur during ETL start-up or execution.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] movies_etl_pipeline::PipelineError),

    /// Search index error.
    #[error("Index error: {0}")]
    IndexError(#[from] movies_etl_repository::IndexError),

    /// Logging setup error.
    #[error("Telemetry error: {0}")]
    TelemetryError(String),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl EtlError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
