use tokio::sync::watch;

/// Transmitter side of the shutdown signal.
pub type ShutdownTx = watch::Sender<()>;

/// Receiver side of the shutdown signal.
///
/// A worker observes a shutdown once [`watch::Receiver::changed`] resolves, either because
/// [`ShutdownTx::send`] was called or because every transmitter was dropped.
pub type ShutdownRx = watch::Receiver<()>;

/// Creates a shutdown channel whose receivers have not seen any signal yet.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    watch::channel(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_reaches_every_receiver() {
        let (tx, mut rx) = create_shutdown_channel();
        let mut other = rx.clone();

        assert!(!rx.has_changed().unwrap());
        tx.send(()).unwrap();

        rx.changed().await.unwrap();
        other.changed().await.unwrap();
    }

    #[tokio::test]
    async fn dropping_the_transmitter_counts_as_shutdown() {
        let (tx, mut rx) = create_shutdown_channel();
        drop(tx);

        assert!(rx.changed().await.is_err());
    }
}
