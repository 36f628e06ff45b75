use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono_tz::Tz;
use reqwest::Client;
use tokio::time::timeout;
use tokio_cron_scheduler::JobScheduler;

use crate::{
    certwatch::CertWatcher,
    config::AppConfig,
    directory::{DirectoryApi, SoapDirectoryClient},
    engine::Engine,
    geo::{GeoLookup, IpinfoClient},
    history::HistoryStore,
    infrastructure::{directories::ResolvedPaths, shutdown::Shutdown},
    notify::{ErrorReporter, Notify, TelegramNotifier},
    tasks::scheduler::{configure_jobs, TaskCallback},
};

/// Wires the leaves to the engine and owns the process lifecycle: one
/// immediate execution of each activity at startup, interval jobs after
/// that, bounded-timeout teardown on shutdown.
pub struct WardenApp {
    scheduler: JobScheduler,
    queue_sweep: TaskCallback,
    cert_check: TaskCallback,
    notifier: Arc<TelegramNotifier>,
    shutdown: Shutdown,
}

impl WardenApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let notifier = Arc::new(TelegramNotifier::new(
            &config.telegram,
            &config.directory.mail_host,
        ));
        let reporter = Arc::new(ErrorReporter::new(notifier.clone()));

        let http = Client::builder()
            .user_agent(concat!("mailq-warden/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let directory = Arc::new(SoapDirectoryClient::new(config.directory.clone())?);
        let geo = Arc::new(IpinfoClient::new(http, config.geo.clone()));

        let store = HistoryStore::new(&paths.state_path);
        store.ensure().await?;

        let timezone: Tz = config
            .timezone
            .parse()
            .unwrap_or(chrono_tz::America::Sao_Paulo);
        let engine = Arc::new(Engine::new(
            directory,
            geo,
            notifier.clone(),
            reporter.clone(),
            store,
            config.rules.clone(),
            config.directory.mail_host.clone(),
            timezone,
        ));
        let certwatch = Arc::new(CertWatcher::new(config.certs.sites.clone(), notifier.clone())?);

        let queue_sweep = build_sweep_callback(engine, reporter);
        let cert_check = build_cert_callback(certwatch);
        let scheduler = configure_jobs(
            config.schedule.queue_poll,
            config.schedule.cert_check,
            queue_sweep.clone(),
            cert_check.clone(),
        )
        .await?;

        Ok(Self {
            scheduler,
            queue_sweep,
            cert_check,
            notifier,
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        let WardenApp {
            mut scheduler,
            queue_sweep,
            cert_check,
            notifier,
            shutdown,
        } = self;

        tracing::info!(target: "lifecycle", "deferred queue monitor starting");
        notifier.send("Monitor started.").await;

        // both activities also run once at process start
        (queue_sweep)();
        (cert_check)();

        scheduler.start().await?;

        let mut listener = shutdown.subscribe();
        listener.notified().await;
        tracing::info!(target: "lifecycle", "shutdown signal received");

        let shutdown_timeout = Duration::from_secs(5);
        match timeout(shutdown_timeout, scheduler.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(target: "scheduler", ?err, "scheduler shutdown failed");
            }
            Err(_) => {
                tracing::warn!(
                    target: "scheduler",
                    "scheduler did not stop within {:?}",
                    shutdown_timeout
                );
            }
        }

        notifier.send("Monitor stopped.").await;
        tracing::info!(target: "lifecycle", "shutdown complete");
        Ok(())
    }
}

/// A sweep tick runs the engine in its own task. The gate keeps at most one
/// sweep alive: remediation and history mutation are not safe to interleave,
/// so a tick that lands mid-run is skipped rather than queued.
fn build_sweep_callback<D, G, N>(
    engine: Arc<Engine<D, G, N>>,
    reporter: Arc<ErrorReporter<N>>,
) -> TaskCallback
where
    D: DirectoryApi + 'static,
    G: GeoLookup + 'static,
    N: Notify + 'static,
{
    let gate = Arc::new(tokio::sync::Mutex::new(()));
    Arc::new(move || {
        let engine = engine.clone();
        let reporter = reporter.clone();
        let gate = gate.clone();
        tokio::spawn(async move {
            let Ok(_running) = gate.try_lock() else {
                tracing::warn!(
                    target: "engine",
                    "previous sweep still running, skipping this tick"
                );
                return;
            };
            if let Err(err) = engine.run().await {
                tracing::error!(target: "engine", error = ?err, "queue sweep failed");
                reporter.report(&err).await;
            }
        });
    })
}

fn build_cert_callback<N: Notify + 'static>(watcher: Arc<CertWatcher<N>>) -> TaskCallback {
    Arc::new(move || {
        let watcher = watcher.clone();
        tokio::spawn(async move {
            watcher.run().await;
        });
    })
}
