use async_trait::async_trait;

pub mod dedup;
pub mod diag;
mod reporter;
mod telegram;

pub use dedup::DedupCache;
pub use diag::Diagnostic;
pub use reporter::ErrorReporter;
pub use telegram::TelegramNotifier;

/// Operator notification channel. Delivery is best-effort: implementations
/// log failures and never propagate them into the engine.
#[async_trait]
pub trait Notify: Send + Sync {
    async fn send(&self, text: &str);
}
