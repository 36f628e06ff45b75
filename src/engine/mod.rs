use std::sync::Arc;

use anyhow::{Context, Result};
use chrono_tz::Tz;

use crate::{
    config::RuleConfig,
    directory::{AuthToken, DirectoryApi, DirectoryError},
    domain::{Action, GeoInfo, QueueSnapshot, SenderVolume},
    geo::GeoLookup,
    history::{HistoryStore, IpHistory},
    notify::{ErrorReporter, Notify},
};

pub mod classify;
mod remediate;
pub mod signals;

/// The classification & remediation engine. One `run` handles one queue
/// snapshot end to end: authenticate, fetch, derive signals per sender,
/// remediate, and persist the updated IP history. Senders are processed
/// strictly one at a time, in snapshot order; remediation and history
/// mutation must not interleave.
pub struct Engine<D, G, N> {
    directory: Arc<D>,
    geo: Arc<G>,
    notifier: Arc<N>,
    reporter: Arc<ErrorReporter<N>>,
    store: HistoryStore,
    rules: RuleConfig,
    mail_host: String,
    timezone: Tz,
}

impl<D, G, N> Engine<D, G, N>
where
    D: DirectoryApi,
    G: GeoLookup,
    N: Notify,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        directory: Arc<D>,
        geo: Arc<G>,
        notifier: Arc<N>,
        reporter: Arc<ErrorReporter<N>>,
        store: HistoryStore,
        rules: RuleConfig,
        mail_host: String,
        timezone: Tz,
    ) -> Self {
        Self {
            directory,
            geo,
            notifier,
            reporter,
            store,
            rules,
            mail_host,
            timezone,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let token = match self.directory.authenticate().await {
            Ok(token) => token,
            Err(DirectoryError::Auth { reason }) => {
                tracing::error!(target: "engine", %reason, "directory authentication failed");
                self.notifier
                    .send(&format!("Directory authentication failed: {reason}"))
                    .await;
                return Ok(());
            }
            Err(err) => return Err(err).context("directory authentication"),
        };

        let snapshot = match self.directory.fetch_queue(&token, &self.mail_host).await {
            Ok(snapshot) => snapshot,
            Err(DirectoryError::QueueData { reason }) => {
                tracing::warn!(target: "engine", %reason, "aborting run without processing");
                self.notifier.send(&reason).await;
                return Ok(());
            }
            Err(err) => return Err(err).context("deferred queue fetch"),
        };

        let mut history = self.store.load().await?;
        for sender in &snapshot.sender_volumes {
            self.process_sender(&token, sender, &snapshot, &mut history)
                .await?;
        }
        self.store.save(&history).await?;

        tracing::info!(
            target: "engine",
            senders = snapshot.sender_volumes.len(),
            "run complete"
        );
        Ok(())
    }

    async fn process_sender(
        &self,
        token: &AuthToken,
        sender: &SenderVolume,
        snapshot: &QueueSnapshot,
        history: &mut IpHistory,
    ) -> Result<()> {
        let address = sender.address.as_str();

        if self.rules.ignored_addresses.iter().any(|a| a == address) {
            tracing::debug!(target: "engine", address, "address is on the ignore list, skipping");
            return Ok(());
        }
        if !address.contains('@') {
            tracing::warn!(target: "engine", address, "not an email address, skipping");
            return Ok(());
        }

        // A sender that already accumulated more distinct IPs than allowed
        // is blocked outright on its most recent historical IP; none of the
        // per-snapshot signals apply and the history is left as it stands.
        if history.distinct_ips(address) > self.rules.ip_threshold {
            if let Some(ip) = history.last_ip(address).map(str::to_string) {
                tracing::warn!(
                    target: "engine",
                    address,
                    %ip,
                    recorded = history.distinct_ips(address),
                    "distinct-IP threshold exceeded, blocking on historical IP"
                );
                let country = self.country_of(&ip).await;
                let label = self.ip_label(&ip, &country);
                let result = self
                    .lock_and_annotate(token, address, label, sender.count)
                    .await;
                return self.absorb_not_found(result, address).await;
            }
        }

        let ip = snapshot.observed_ip(address).map(str::to_string);
        let geo = match &ip {
            Some(ip) => self.lookup_geo(ip).await,
            None => None,
        };
        let country = geo
            .as_ref()
            .and_then(|g| g.country.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let hostname = geo
            .as_ref()
            .and_then(|g| g.hostname.clone())
            .unwrap_or_default();

        let sig = signals::derive_signals(
            address,
            sender.count,
            ip,
            &country,
            &hostname,
            history,
            &self.rules,
        );
        tracing::debug!(
            target: "engine",
            address,
            count = sig.count,
            ip = sig.ip.as_deref().unwrap_or("-"),
            %country,
            is_foreign = sig.is_foreign,
            is_known_service = sig.is_known_service,
            is_ip_new = sig.is_ip_new,
            "derived sender signals"
        );

        let action = classify::classify(address, &sig, &self.rules);
        let result = match action {
            Action::Critical => {
                self.lock_and_annotate(
                    token,
                    address,
                    "IP not found (CRITICAL)".to_string(),
                    sig.count,
                )
                .await
            }
            Action::Block => {
                // Block implies an IP was present in this snapshot
                let label = match sig.ip.as_deref() {
                    Some(ip) => self.ip_label(ip, &country),
                    None => "unknown".to_string(),
                };
                self.lock_and_annotate(token, address, label, sig.count).await
            }
            Action::ChangePassword => self.change_password(token, address, sig.count).await,
            Action::InternalWarn => {
                self.internal_warn(address, sig.count).await;
                Ok(())
            }
            Action::None => {
                tracing::debug!(target: "engine", address, "no action required");
                Ok(())
            }
        };
        self.absorb_not_found(result, address).await?;

        // Observation log: the IP is recorded whatever the action was, so
        // quiet senders build history too.
        if sig.is_ip_new {
            if let Some(ip) = &sig.ip {
                history.record(address, ip);
            }
        }
        Ok(())
    }

    async fn lookup_geo(&self, ip: &str) -> Option<GeoInfo> {
        match self.geo.resolve(ip).await {
            Ok(info) => Some(info),
            Err(err) => {
                self.reporter.report(&anyhow::Error::from(err)).await;
                None
            }
        }
    }

    async fn country_of(&self, ip: &str) -> String {
        self.lookup_geo(ip)
            .await
            .and_then(|g| g.country)
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn ip_label(&self, ip: &str, country: &str) -> String {
        if country != self.rules.home_country {
            format!("{ip} (foreign: {country})")
        } else {
            ip.to_string()
        }
    }

    /// Absent accounts downgrade to one informational notification and the
    /// run moves on; every other remediation failure aborts the run.
    async fn absorb_not_found(
        &self,
        result: Result<(), DirectoryError>,
        address: &str,
    ) -> Result<()> {
        match result {
            Err(err) if err.is_not_found() => {
                tracing::info!(target: "engine", address, "account vanished during remediation");
                self.notifier
                    .send(&format!("No such account for address {address}"))
                    .await;
                Ok(())
            }
            other => other.with_context(|| format!("remediation for {address}")),
        }
    }

    fn dated_note(&self) -> String {
        let date = chrono::Utc::now()
            .with_timezone(&self.timezone)
            .format("%d/%m/%Y");
        format!("blocked on {date} (spam)")
    }
}
