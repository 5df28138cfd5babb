//! Periodic refresh cycles

use anyhow::Result;
use stat_fetcher::GameLogSource;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::pipeline::{is_fatal, Pipeline};

/// Run refresh cycles on a fixed interval until `shutdown` resolves.
///
/// A failed cycle is logged and the next one runs on schedule. A store
/// failure stops the loop and is returned.
pub async fn run_scheduled<S>(
    pipeline: Arc<Pipeline>,
    source: Arc<dyn GameLogSource>,
    config: &SchedulerConfig,
    shutdown: S,
) -> Result<usize>
where
    S: Future<Output = ()>,
{
    let period = config.interval();
    let start = if config.run_on_start { Instant::now() } else { Instant::now() + period };
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tokio::pin!(shutdown);
    let mut cycles = 0;

    info!("Scheduler started, refreshing every {:?}", period);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Scheduler stopping after {} cycles", cycles);
                return Ok(cycles);
            }
            _ = ticker.tick() => {
                cycles += 1;
                match pipeline.refresh(Arc::clone(&source)).await {
                    Ok(_) => {}
                    Err(e) if is_fatal(&e) => {
                        error!("Refresh cycle {} hit a store failure: {:#}", cycles, e);
                        return Err(e);
                    }
                    Err(e) => error!("Refresh cycle {} failed: {:#}", cycles, e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use stat_fetcher::MemorySource;
    use std::time::Duration;
    use tempfile::TempDir;

    fn pipeline(dir: &TempDir) -> Arc<Pipeline> {
        let mut config = ServiceConfig::default();
        config.store.data_dir = dir.path().join("data");
        config.registry.models_dir = dir.path().join("models");
        Arc::new(Pipeline::open(config).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_on_start_then_every_interval() {
        let dir = TempDir::new().unwrap();
        let config = SchedulerConfig { refresh_interval_mins: 1, run_on_start: true };

        // Start, +60s, +120s, then stop before +180s
        let cycles = run_scheduled(
            pipeline(&dir),
            Arc::new(MemorySource::new(10)),
            &config,
            tokio::time::sleep(Duration::from_secs(150)),
        )
        .await
        .unwrap();

        assert_eq!(cycles, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_one_interval_when_not_running_on_start() {
        let dir = TempDir::new().unwrap();
        let config = SchedulerConfig { refresh_interval_mins: 1, run_on_start: false };

        let cycles = run_scheduled(
            pipeline(&dir),
            Arc::new(MemorySource::new(10)),
            &config,
            tokio::time::sleep(Duration::from_secs(30)),
        )
        .await
        .unwrap();

        assert_eq!(cycles, 0);
    }
}
