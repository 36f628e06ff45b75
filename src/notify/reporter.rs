use std::sync::Arc;

use chrono::Utc;

use crate::notify::{DedupCache, Diagnostic, Notify};

/// Error-notification policy: format a compact diagnostic, drop bodies with
/// no identifying fields, and suppress repeats of the same underlying cause
/// within the rolling window. Remediation notifications do not pass through
/// here; only failures do.
pub struct ErrorReporter<N> {
    notifier: Arc<N>,
    dedup: DedupCache,
}

impl<N: Notify> ErrorReporter<N> {
    pub fn new(notifier: Arc<N>) -> Self {
        Self {
            notifier,
            dedup: DedupCache::standard(),
        }
    }

    pub async fn report(&self, err: &anyhow::Error) {
        let diag = Diagnostic::from_error(err);
        if !diag.has_identity() {
            tracing::info!(
                target: "notify",
                message = %diag.message,
                "suppressing diagnostic with no identifying fields"
            );
            return;
        }
        if !self.dedup.admit(diag.key(), Utc::now()) {
            tracing::info!(
                target: "notify",
                message = %diag.message,
                "suppressing repeated error notification"
            );
            return;
        }
        self.notifier.send(&diag.render()).await;
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notify for RecordingNotifier {
        async fn send(&self, text: &str) {
            self.sent.lock().push(text.to_string());
        }
    }

    #[tokio::test]
    async fn identical_errors_deliver_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let reporter = ErrorReporter::new(notifier.clone());
        let make = || anyhow::Error::from(std::io::Error::from_raw_os_error(111));
        reporter.report(&make()).await;
        reporter.report(&make()).await;
        assert_eq!(notifier.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn unidentifiable_errors_are_never_delivered() {
        let notifier = Arc::new(RecordingNotifier::default());
        let reporter = ErrorReporter::new(notifier.clone());
        reporter.report(&anyhow::anyhow!("vague failure")).await;
        assert!(notifier.sent.lock().is_empty());
    }
}
