//! Dependency initialization and wiring for the movies ETL.

use std::sync::Arc;

use tracing::info;

use crate::config::{Settings, StateBackend};
use crate::EtlError;
use movies_etl_pipeline::{
    extractor::Extractor,
    loader::SearchLoader,
    orchestrator::{Orchestrator, OrchestratorConfig},
    state::StateStore,
    transformer::DocumentTransformer,
    PipelineError,
};
use movies_etl_repository::{
    JsonFileStateStorage, OpenSearchClient, PostgresMovieSource, RedisStateStorage, StateStorage,
};
use movies_etl_shared::SourceTable;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
    /// The source pool, closed after the orchestrator stops.
    pub source: Arc<PostgresMovieSource>,
}

impl Dependencies {
    /// Connect to every external service and wire the pipeline.
    ///
    /// Connections are retried with the configured backoff; running out of
    /// attempts fails start-up.
    pub async fn new(settings: &Settings) -> Result<Self, EtlError> {
        let retry = settings.retry;

        info!(
            db_host = %settings.postgres.host,
            db_port = settings.postgres.port,
            search_url = %settings.search.url,
            state_backend = ?settings.state_backend,
            batch_size = settings.batch_size,
            "Initializing dependencies"
        );

        let source = retry
            .execute("postgres.connect", || {
                PostgresMovieSource::connect(&settings.postgres)
            })
            .await?;
        let source = Arc::new(source);

        let extractor = Extractor::new(source.clone(), retry, settings.batch_size)?;
        if !extractor.health_check().await? {
            return Err(EtlError::config("Source database is unhealthy"));
        }

        let loader = SearchLoader::new(Arc::new(OpenSearchClient::new(&settings.search)?), retry);
        if !loader.health_check().await? {
            return Err(EtlError::config("Search cluster is unhealthy"));
        }
        info!("Search cluster connection verified");

        let storage: Arc<dyn StateStorage> = match &settings.state_backend {
            StateBackend::Redis => Arc::new(
                retry
                    .execute("redis.connect", || RedisStateStorage::connect(&settings.redis))
                    .await?,
            ),
            StateBackend::File(path) => Arc::new(
                JsonFileStateStorage::open(path)
                    .await
                    .map_err(PipelineError::from)?,
            ),
        };
        let state = StateStore::new(storage, retry);

        let orchestrator = Orchestrator::with_config(
            extractor,
            DocumentTransformer::new(),
            loader,
            state,
            OrchestratorConfig {
                poll_interval: settings.poll_interval,
                tables: SourceTable::ALL.to_vec(),
            },
        );

        Ok(Self {
            orchestrator,
            source,
        })
    }
}
