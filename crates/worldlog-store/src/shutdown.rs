// ABOUTME: Shutdown signal raised by the store on a fatal storage fault.
// ABOUTME: The host awaits it to begin orderly process shutdown.

use tokio::sync::watch;

/// Receiving side of the store's fatal-fault signal.
///
/// The store raises this exactly once, on the first unrecoverable storage
/// error. A normal `close()` never raises it.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub(crate) fn new() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    /// Whether a fatal fault has occurred.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until a fatal fault occurs. Never completes if the store is
    /// closed normally without ever faulting.
    pub async fn triggered(mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Sender dropped on a clean close: no fault will ever come.
                std::future::pending::<()>().await;
            }
        }
    }
}
