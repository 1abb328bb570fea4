use dotenv::dotenv;
use labflow_engine::{init_logging, EngineConfig, LabflowEngine};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = EngineConfig::from_env()?;
    init_logging(&config.log_filter);

    let engine = LabflowEngine::from_config(&config)?;
    engine.recover_interrupted()?;
    info!(
        database = %config.database_url,
        executions = %config.executions_root.display(),
        engine = %config.engine_program,
        "labflow worker started"
    );
    let runner = engine.spawn_runner();

    let mut poll = interval(config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = poll.tick() => match engine.enqueue_prepared().await {
                Ok(0) => {}
                Ok(n) => info!(count = n, "queued prepared runs"),
                Err(e) => error!("failed to queue prepared runs: {e}"),
            },
        }
    }

    info!("shutting down");
    engine.shutdown().await;
    // an in-flight run is dropped: its child is killed and the row ends in ERROR
    runner.abort();
    match runner.await {
        Err(e) if !e.is_cancelled() => error!("task runner ended abnormally: {e}"),
        _ => {}
    }
    Ok(())
}
