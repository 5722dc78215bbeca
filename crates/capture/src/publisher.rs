//! Scan snapshot publication.
//!
//! Consumers hold `Arc<Scan>` snapshots from a `watch` channel and never see
//! a half-written scan. The snapshot replaced by a publish is kept and
//! reused for the next one once every reader has dropped it.

use std::sync::Arc;

use contracts::Scan;
use tokio::sync::watch;
use tracing::trace;

pub struct ScanPublisher {
    tx: watch::Sender<Arc<Scan>>,
    spare: Option<Arc<Scan>>,
}

impl ScanPublisher {
    pub fn new(initial: Scan) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx, spare: None }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Scan>> {
        self.tx.subscribe()
    }

    /// Most recently published snapshot
    pub fn latest(&self) -> Arc<Scan> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish a copy of `scan`
    pub fn publish(&mut self, scan: &Scan) {
        let snapshot = self.recycle(scan);
        let previous = self.tx.send_replace(snapshot);
        self.spare = Some(previous);
    }

    fn recycle(&mut self, scan: &Scan) -> Arc<Scan> {
        if let Some(mut spare) = self.spare.take() {
            if let Some(slot) = Arc::get_mut(&mut spare) {
                slot.copy_from(scan);
                return spare;
            }
            trace!(cycle = scan.cycle, "Previous snapshot still held, allocating");
        }
        Arc::new(scan.clone())
    }
}
