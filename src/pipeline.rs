//! The durability pipeline.
//!
//! One dedicated background thread continuously moves dirty counter state
//! out of the cache into storage, in strict chronological order, without
//! ever blocking a request: requests only touch the cache, and the cache's
//! rotation is the sole point of contact between the two sides.
//!
//! ## Cycle
//!
//! 1. rotate the cache's dirty set out as a batch
//! 2. if non-empty: journal the epoch boundary (write-ahead), queue the
//!    batch at the tail
//! 3. drain the queue from the head: at most one store attempt per batch
//!    per cycle; a failure leaves the failed batch and everything behind
//!    it queued for the next cycle
//! 4. wait out the rest of the interval, or a stop request
//!
//! The pending queue is owned by the worker thread alone; no lock guards
//! it. Batches are never dropped and never reordered: a stuck batch blocks
//! everything behind it until storage accepts it (ordering over
//! availability).

use crate::cache::{Batch, Cache};
use crate::journal::Journal;
use crate::storage::Storage;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Handle to the durability worker thread.
///
/// Dropping the handle stops the worker; prefer [`BatchSubmitter::close`]
/// for an explicit, joined shutdown.
pub struct BatchSubmitter {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl BatchSubmitter {
    /// Spawns the worker thread with the given cycle interval.
    pub fn spawn(
        cache: Arc<Cache>,
        journal: Journal,
        storage: Arc<dyn Storage>,
        interval: Duration,
    ) -> crate::Result<Self> {
        let (stop_tx, stop_rx) = bounded(1);
        let handle = std::thread::Builder::new()
            .name("countdb-submit".to_string())
            .spawn(move || {
                let worker = Worker { cache, journal, storage, pending: VecDeque::new() };
                worker.run(interval, stop_rx);
            })?;
        Ok(Self { stop_tx, handle: Some(handle) })
    }

    /// Requests a stop and waits for the worker to finish.
    ///
    /// The worker completes any in-flight store/confirm, runs one final
    /// rotate-and-drain pass, and exits; no batch is abandoned mid-store.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else { return };
        let _ = self.stop_tx.send(());
        if handle.join().is_err() {
            log::error!("Durability worker panicked");
        }
    }
}

impl Drop for BatchSubmitter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    cache: Arc<Cache>,
    journal: Journal,
    storage: Arc<dyn Storage>,
    /// FIFO of rotated batches awaiting storage, oldest first.
    pending: VecDeque<Batch>,
}

impl Worker {
    fn run(mut self, interval: Duration, stop_rx: Receiver<()>) {
        log::info!("Durability worker started, interval {:?}", interval);
        loop {
            let deadline = Instant::now() + interval;
            self.cycle();
            match stop_rx.recv_deadline(deadline) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // Final pass on shutdown: anything rotated gets journaled and one
        // last store attempt, matching a flush-on-close.
        self.cycle();
        if !self.pending.is_empty() {
            log::warn!(
                "Durability worker stopping with {} unstored batch(es); their epochs remain \
                 unconfirmed in the journal",
                self.pending.len()
            );
        }
        log::info!("Durability worker stopped");
    }

    fn cycle(&mut self) {
        let batch = self.cache.rotate();
        if !batch.is_empty() {
            // Write-ahead: the epoch boundary is durably recorded before
            // any storage attempt for this batch.
            if let Err(e) = self.journal.rotate() {
                log::error!("Journal rotate failed: {}; batch stays queued for storage", e);
            }
            log::debug!("Rotated batch of {} counter(s)", batch.len());
            self.pending.push_back(batch);
        }
        self.drain();
    }

    fn drain(&mut self) {
        while let Some(front) = self.pending.front() {
            match self.storage.store(front) {
                Ok(()) => {
                    self.pending.pop_front();
                    if let Err(e) = self.journal.confirm() {
                        log::error!("Journal confirm failed: {}", e);
                    }
                }
                Err(e) => {
                    // Head-of-line stays put; everything behind it waits.
                    log::warn!(
                        "Storage rejected batch ({} queued), retrying next cycle: {}",
                        self.pending.len(),
                        e
                    );
                    break;
                }
            }
        }
    }
}
