use std::sync::Weak;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};

use super::orchestrator::Orchestrator;
use crate::errors::*;

/// Background staleness timer. Each tick retrains when the training data changed since
/// the last sync. Ticks run on a single thread so they never overlap.
pub struct AutoTrainer {
    shutdown: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl AutoTrainer {
    pub fn start(orchestrator: Weak<Orchestrator>, interval: Duration) -> Result<Self> {
        let (shutdown, shutdown_receiver) = bounded(1);
        let handle = thread::Builder::new()
            .name("nlu-auto-train".to_string())
            .spawn(move || run(orchestrator, interval, shutdown_receiver))?;
        info!("Auto-train enabled, checking every {:?}", interval);
        Ok(Self {
            shutdown: Some(shutdown),
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        // Dropping the sender disconnects the channel and wakes the timer up
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("Auto-train thread panicked");
            }
            debug!("Auto-train stopped");
        }
    }
}

impl Drop for AutoTrainer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(orchestrator: Weak<Orchestrator>, interval: Duration, shutdown: Receiver<()>) {
    loop {
        match shutdown.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        let orchestrator = match orchestrator.upgrade() {
            Some(orchestrator) => orchestrator,
            None => break,
        };
        if let Err(e) = orchestrator.auto_train_tick() {
            warn!("Auto-train failed: {}", e);
        }
    }
}
