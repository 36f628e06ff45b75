use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

pub type TaskCallback = Arc<dyn Fn() + Send + Sync>;

/// Registers the two repeated-interval activities. Callbacks spawn their own
/// work, so a slow sweep never stalls the scheduler tick. The scheduler is
/// returned unstarted; the app fires each activity once before starting it.
pub async fn configure_jobs(
    queue_interval: Duration,
    cert_interval: Duration,
    queue_sweep: TaskCallback,
    cert_check: TaskCallback,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    for (label, interval, callback) in [
        ("queue-sweep", queue_interval, queue_sweep),
        ("cert-check", cert_interval, cert_check),
    ] {
        let job = Job::new_repeated_async(interval, move |_id, _lock| {
            let callback = callback.clone();
            Box::pin(async move {
                tracing::debug!(target: "scheduler", job = label, "job triggered");
                callback();
            })
        })?;
        scheduler.add(job).await?;
        tracing::info!(
            target: "scheduler",
            job = label,
            interval_secs = interval.as_secs(),
            "job registered"
        );
    }
    Ok(scheduler)
}
