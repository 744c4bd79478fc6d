use movies_etl::{Dependencies, EtlError, Settings, Telemetry};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), EtlError> {
    dotenv::dotenv().ok();

    // Dropped last so buffered log lines are flushed on exit.
    let _telemetry = Telemetry::from_env()?;

    let settings = Settings::from_env()
        .inspect_err(|e| error!(error = %e, "Invalid configuration"))?;
    let deps = Dependencies::new(&settings)
        .await
        .inspect_err(|e| error!(error = %e, "Failed to initialize dependencies"))?;

    let result = deps.orchestrator.run().await;
    deps.source.close().await;

    match result {
        Ok(()) => {
            info!("Movies ETL stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Movies ETL failed");
            Err(e.into())
        }
    }
}
