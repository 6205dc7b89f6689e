use anyhow::Result;
use tokio_cron_scheduler::JobScheduler;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use elpris_finder::finder::schedule_sweeps;
use elpris_finder::{Config, ElprisFinder};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting Elpriskollen offer finder");

    let config = Config::from_env()?;
    let schedule = config.schedule.clone();
    let finder = ElprisFinder::new(config).await?;

    let Some(schedule) = schedule else {
        finder.run_sweep().await?;
        return Ok(());
    };

    let sched = JobScheduler::new().await?;

    schedule_sweeps(&sched, &schedule, move || {
        let finder = finder.clone();
        async move {
            if let Err(e) = finder.run_sweep().await {
                error!("Sweep failed: {}", e);
            }
        }
    })
    .await?;

    info!("Scheduler started ({})", schedule);
    sched.start().await?;

    // Keep the program running
    loop {
        tokio::time::sleep(tokio::time::Duration::from_secs(30)).await;
    }
}
