use tokio::sync::watch;

/// Broadcast shutdown flag. The app holds the `Shutdown` half; every task
/// that needs to notice termination takes a listener.
#[derive(Clone)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn trigger(&self) {
        let _ = self.sender.send(true);
    }

    /// SIGINT and SIGTERM both flip the flag.
    pub fn install_signal_handlers(&self) {
        let on_interrupt = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.trigger();
            }
        });

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let on_terminate = self.clone();
            tokio::spawn(async move {
                if let Ok(mut term) = signal(SignalKind::terminate()) {
                    term.recv().await;
                    on_terminate.trigger();
                }
            });
        }
    }
}

#[derive(Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Resolves once shutdown has been triggered; immediately if it already
    /// was.
    pub async fn notified(&mut self) {
        if *self.receiver.borrow() {
            return;
        }
        let _ = self.receiver.changed().await;
    }
}
