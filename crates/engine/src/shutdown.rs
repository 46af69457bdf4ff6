use std::sync::Arc;

use tokio::sync::watch;

/// Create a linked shutdown handle and receiver.
pub fn channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx: Arc::new(tx) }, Shutdown { rx })
}

/// Cloneable trigger, held by the Ctrl-C listener (and tests).
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Trigger on the first Ctrl-C. Call from `tokio::spawn`.
    pub async fn trigger_on_ctrl_c(self) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received, stopping after the current cycle");
                self.trigger();
            }
            Err(e) => tracing::warn!(error = %e, "Unable to listen for Ctrl-C"),
        }
    }
}

/// Receiving side, owned by the stream loop.
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is triggered. Never resolves if every handle is
    /// dropped without triggering.
    pub async fn triggered(&mut self) {
        if self.rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
