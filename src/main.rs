use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use tidepool::config::{Config, DemoConfig};
use tidepool::{logging, ThreadPool};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;

    // Initialize logging
    logging::init(&config.logging)?;

    info!("Starting tidepool {}...", tidepool::version());
    config.log_summary();

    // Single-threaded runtime: the pool's own threads do the work
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let pool = Arc::new(ThreadPool::new(config.pool.clone())?);

    // Submission blocks on backpressure, so keep it off the runtime thread
    let producer = {
        let pool = Arc::clone(&pool);
        let demo = config.demo.clone();
        tokio::task::spawn_blocking(move || submit_workload(&pool, &demo))
    };

    tokio::select! {
        _ = tokio::time::sleep(config.demo.run_for) => {
            info!("Demo period elapsed");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    // Cleanup: unblocks the producer if it is waiting for queue space
    pool.destroy();

    match producer.await {
        Ok(submitted) => info!("Submitted {} of {} tasks", submitted, config.demo.tasks),
        Err(e) => warn!("Producer failed: {}", e),
    }

    let stats = pool.stats();
    info!("Final stats: {}", serde_json::to_string(&stats)?);
    println!("{}", pool.metrics().export());

    Ok(())
}

/// Submit the demo tasks, returning how many were accepted.
fn submit_workload(pool: &ThreadPool, demo: &DemoConfig) -> u64 {
    let sleep = demo.task_duration.unwrap_or(Duration::ZERO);

    for n in 0..demo.tasks {
        let result = pool.submit(
            move |num: u64| {
                info!(num, "task running");
                std::thread::sleep(sleep);
            },
            n + 100,
        );
        if let Err(e) = result {
            warn!(error = %e, "stopped submitting");
            return n;
        }
    }
    demo.tasks
}
