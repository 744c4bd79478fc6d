//! Orchestrator module for the movies ETL pipeline.
//!
//! Runs one sync cycle per source table, in a fixed order, then sleeps and
//! starts over.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use movies_etl_shared::{
    SecondaryIndex, SecondaryTarget, SourceTable, Watermark, GENRES_INDEX, MOVIES_INDEX,
    PERSONS_INDEX,
};

use crate::errors::PipelineError;
use crate::extractor::Extractor;
use crate::loader::SearchLoader;
use crate::state::StateStore;
use crate::transformer::DocumentTransformer;

/// Phase of a table's cycle, reported when the cycle aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Extracting,
    Resolving,
    Hydrating,
    Transforming,
    Loading,
    Advancing,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Extracting => "extracting",
            Self::Resolving => "resolving",
            Self::Hydrating => "hydrating",
            Self::Transforming => "transforming",
            Self::Loading => "loading",
            Self::Advancing => "advancing",
        };
        f.write_str(name)
    }
}

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Pause between two passes over the tables.
    pub poll_interval: Duration,
    /// Tables to synchronize, in order.
    pub tables: Vec<SourceTable>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            tables: SourceTable::ALL.to_vec(),
        }
    }
}

/// Outcome of one successful table cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TableReport {
    pub table: SourceTable,
    /// Changed rows seen by the extraction.
    pub changed_rows: usize,
    /// Film documents written to the movies index.
    pub films_indexed: usize,
    /// Documents written to the table's secondary index.
    pub secondary_indexed: usize,
    /// Affected films for which the source returned no usable rows.
    pub missing_roots: usize,
    /// Watermark after the cycle.
    pub watermark: Watermark,
    /// Whether the watermark was written.
    pub advanced: bool,
}

impl TableReport {
    fn new(table: SourceTable, watermark: Watermark) -> Self {
        Self {
            table,
            changed_rows: 0,
            films_indexed: 0,
            secondary_indexed: 0,
            missing_roots: 0,
            watermark,
            advanced: false,
        }
    }
}

/// Orchestrator that coordinates the pipeline components.
pub struct Orchestrator {
    extractor: Extractor,
    transformer: DocumentTransformer,
    loader: SearchLoader,
    state: StateStore,
    config: OrchestratorConfig,
    shutdown_tx: watch::Sender<bool>,
}

impl Orchestrator {
    /// Create a new orchestrator with the default configuration.
    pub fn new(
        extractor: Extractor,
        transformer: DocumentTransformer,
        loader: SearchLoader,
        state: StateStore,
    ) -> Self {
        Self::with_config(
            extractor,
            transformer,
            loader,
            state,
            OrchestratorConfig::default(),
        )
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        extractor: Extractor,
        transformer: DocumentTransformer,
        loader: SearchLoader,
        state: StateStore,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            extractor,
            transformer,
            loader,
            state,
            config,
            shutdown_tx,
        }
    }

    /// Run until Ctrl-C or [`Orchestrator::shutdown`].
    ///
    /// Fails only if the indices cannot be prepared. Table failures are logged
    /// and retried on the next pass.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), PipelineError> {
        info!(
            tables = self.config.tables.len(),
            poll_interval_secs = self.config.poll_interval.as_secs(),
            batch_size = self.extractor.batch_size(),
            "Starting movies ETL orchestrator"
        );

        self.loader.ensure_indices().await?;

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            self.run_once().await;

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown_rx.changed() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        info!("Orchestrator shutdown complete");
        Ok(())
    }

    /// One pass over every configured table.
    ///
    /// A failing table does not stop the pass.
    pub async fn run_once(&self) -> Vec<(SourceTable, Result<TableReport, PipelineError>)> {
        let mut reports = Vec::with_capacity(self.config.tables.len());

        for &table in &self.config.tables {
            let result = self.sync_table(table).await;
            match &result {
                Ok(report) if report.changed_rows > 0 => info!(
                    table = %table,
                    changed_rows = report.changed_rows,
                    films_indexed = report.films_indexed,
                    secondary_indexed = report.secondary_indexed,
                    missing_roots = report.missing_roots,
                    watermark = %report.watermark.date,
                    "Table synchronized"
                ),
                Ok(_) => {}
                Err(e) => error!(table = %table, error = %e, "Table sync failed"),
            }
            reports.push((table, result));
        }

        reports
    }

    /// Run one cycle of `table`.
    ///
    /// On error the table's watermark is left where it was.
    #[instrument(skip(self))]
    pub async fn sync_table(&self, table: SourceTable) -> Result<TableReport, PipelineError> {
        let mut phase = SyncPhase::Extracting;
        let result = self.run_cycle(table, &mut phase).await;
        result.map_err(|e| PipelineError::cycle_aborted(table, phase, e))
    }

    async fn run_cycle(
        &self,
        table: SourceTable,
        phase: &mut SyncPhase,
    ) -> Result<TableReport, PipelineError> {
        *phase = SyncPhase::Extracting;
        let watermark = self.state.get(table).await?;
        let mut report = TableReport::new(table, watermark);
        let mut latest: Option<DateTime<Utc>> = None;

        let mut pages = self.extractor.changed_ids(table, &watermark);
        while let Some(page) = pages.try_next().await? {
            report.changed_rows += page.len();
            let changed: Vec<Uuid> = page.iter().map(|row| row.id).collect();

            *phase = SyncPhase::Resolving;
            let roots = self.extractor.affected_roots(table, &changed).await?;
            for chunk in roots.chunks(self.extractor.batch_size()) {
                self.sync_films(chunk, phase, &mut report).await?;
            }

            if let Some(target) = table.secondary() {
                report.secondary_indexed +=
                    self.sync_secondary(table, target, &changed, phase).await?;
            }

            latest = latest.max(page.iter().map(|row| row.modified).max());
            *phase = SyncPhase::Extracting;
        }
        drop(pages);

        *phase = SyncPhase::Advancing;
        if let Some(observed) = latest {
            let next = watermark.advanced_to(observed);
            if next != watermark {
                self.state.set(table, &next).await?;
                report.advanced = true;
            }
            report.watermark = next;
        }

        Ok(report)
    }

    /// Rebuild and load the documents of `film_ids`.
    async fn sync_films(
        &self,
        film_ids: &[Uuid],
        phase: &mut SyncPhase,
        report: &mut TableReport,
    ) -> Result<(), PipelineError> {
        *phase = SyncPhase::Hydrating;
        let rows = self.extractor.hydrate(film_ids).await?;

        *phase = SyncPhase::Transforming;
        let documents = self.transformer.merge_films(rows);
        for id in film_ids.iter().filter(|id| !documents.contains_key(*id)) {
            warn!(film_id = %id, "No data found for affected film");
            report.missing_roots += 1;
        }

        *phase = SyncPhase::Loading;
        report.films_indexed += self
            .loader
            .bulk_upsert(MOVIES_INDEX, documents.values())
            .await?;
        Ok(())
    }

    /// Rebuild and load the secondary documents affected by `changed`.
    async fn sync_secondary(
        &self,
        table: SourceTable,
        target: SecondaryTarget,
        changed: &[Uuid],
        phase: &mut SyncPhase,
    ) -> Result<usize, PipelineError> {
        *phase = SyncPhase::Resolving;
        let ids = self.extractor.secondary_ids(table, changed).await?;

        let mut loaded = 0;
        for chunk in ids.chunks(self.extractor.batch_size()) {
            loaded += match target.index {
                SecondaryIndex::Persons => {
                    *phase = SyncPhase::Hydrating;
                    let rows = self.extractor.hydrate_persons(chunk).await?;
                    *phase = SyncPhase::Transforming;
                    let documents = self.transformer.merge_persons(rows);
                    *phase = SyncPhase::Loading;
                    self.loader
                        .bulk_upsert(PERSONS_INDEX, documents.values())
                        .await?
                }
                SecondaryIndex::Genres => {
                    *phase = SyncPhase::Hydrating;
                    let rows = self.extractor.hydrate_genres(chunk).await?;
                    *phase = SyncPhase::Transforming;
                    let documents = self.transformer.merge_genres(rows);
                    *phase = SyncPhase::Loading;
                    self.loader
                        .bulk_upsert(GENRES_INDEX, documents.values())
                        .await?
                }
            };
        }
        Ok(loaded)
    }

    /// Trigger a graceful shutdown after the current pass.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
