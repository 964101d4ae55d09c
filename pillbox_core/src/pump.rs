//! Background sensor event pump.
//!
//! Spawns a thread that owns the `SensorSource` and forwards every event, in
//! arrival order, through an unbounded channel. Unlike a latest-value
//! sampler nothing is coalesced: the detector has to see each sample.
//!
//! Each `EventPump` spawns exactly one thread, shut down and joined when the
//! pump is dropped.
use crossbeam_channel as xch;
use pillbox_traits::{SensorEvent, SensorSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Result of waiting on the pump.
#[derive(Debug, Clone, PartialEq)]
pub enum PumpRecv {
    Event(SensorEvent),
    /// Nothing arrived within the wait.
    Idle,
    /// The source finished or the thread exited; no more events will come.
    Closed,
}

pub struct EventPump {
    rx: xch::Receiver<SensorEvent>,
    errors: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl EventPump {
    /// `poll` bounds each blocking wait on the source so shutdown is noticed
    /// promptly.
    pub fn spawn<S: SensorSource + Send + 'static>(mut source: S, poll: Duration) -> Self {
        let (tx, rx) = xch::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let errors = Arc::new(AtomicU64::new(0));
        let errors_clone = errors.clone();

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("event pump received shutdown signal");
                    break;
                }

                match source.next_event(poll) {
                    Ok(Some(ev)) => {
                        if tx.send(ev).is_err() {
                            tracing::debug!("event pump consumer disconnected, exiting thread");
                            break;
                        }
                    }
                    Ok(None) => {
                        if source.is_finished() {
                            tracing::debug!("sensor source finished");
                            break;
                        }
                    }
                    Err(e) => {
                        errors_clone.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %e, "sensor read failed");
                    }
                }
            }
            tracing::trace!("event pump thread exiting cleanly");
        });

        Self {
            rx,
            errors,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    pub fn recv_timeout(&self, wait: Duration) -> PumpRecv {
        match self.rx.recv_timeout(wait) {
            Ok(ev) => PumpRecv::Event(ev),
            Err(xch::RecvTimeoutError::Timeout) => PumpRecv::Idle,
            Err(xch::RecvTimeoutError::Disconnected) => PumpRecv::Closed,
        }
    }

    /// Transport errors seen so far.
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

impl Drop for EventPump {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        // The thread exits after at most one `poll` wait.
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("event pump thread joined successfully");
                }
                Err(e) => {
                    tracing::warn!(?e, "event pump thread panicked during shutdown");
                }
            }
        }
    }
}
