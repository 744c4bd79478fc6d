//! Error types for the movies ETL pipeline.

use movies_etl_repository::{IndexError, SourceError, StateError};
use movies_etl_shared::SourceTable;
use thiserror::Error;

use crate::orchestrator::SyncPhase;

/// Errors that can occur in the movies ETL pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Error from the relational source.
    #[error("Source error: {0}")]
    SourceError(#[from] SourceError),

    /// Error from the search index.
    #[error("Index error: {0}")]
    IndexError(#[from] IndexError),

    /// Error from the state store.
    #[error("State error: {0}")]
    StateError(#[from] StateError),

    /// A transient failure outlasted the retry budget.
    #[error("{operation} gave up after {attempts} attempts: {source}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<PipelineError>,
    },

    /// The index accepted the bulk request but rejected some documents.
    #[error("Bulk upsert into {index} failed for {failed} of {total} documents")]
    PartialBulkFailure {
        index: String,
        failed: usize,
        total: usize,
    },

    /// Invalid pipeline configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A table's cycle stopped; its watermark was left untouched.
    #[error("{table} sync aborted while {phase}: {source}")]
    CycleAborted {
        table: SourceTable,
        phase: SyncPhase,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Wrap an error that stopped `table`'s cycle during `phase`.
    pub fn cycle_aborted(table: SourceTable, phase: SyncPhase, source: PipelineError) -> Self {
        Self::CycleAborted {
            table,
            phase,
            source: Box::new(source),
        }
    }

    /// Whether retrying the failed call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::SourceError(e) => e.is_transient(),
            Self::IndexError(e) => e.is_transient(),
            Self::StateError(e) => e.is_transient(),
            Self::RetryExhausted { .. }
            | Self::PartialBulkFailure { .. }
            | Self::ConfigError(_)
            | Self::CycleAborted { .. } => false,
        }
    }
}
