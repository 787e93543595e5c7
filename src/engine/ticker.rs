//! Periodic auto-dispatch: one `dispatch_next` per tick until shutdown.
//!
//! The ticker is just another caller of the engine; it holds no state of
//! its own beyond the interval and the shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info};

use super::dispatch::{DispatchEngine, Dispatched};

/// Configuration for the auto-dispatcher.
#[derive(Debug, Clone)]
pub struct TickerConfig {
    /// Time between dispatch attempts.
    pub interval: Duration,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
        }
    }
}

/// Drives `dispatch_next` on a timer.
#[derive(Clone)]
pub struct AutoDispatcher {
    engine: DispatchEngine,
    config: TickerConfig,
    shutdown: Arc<Notify>,
}

impl AutoDispatcher {
    pub fn new(engine: DispatchEngine, config: TickerConfig) -> Self {
        Self {
            engine,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Signal the loop to stop. Safe to call before `run` starts.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Run until shutdown. Returns how many tickets were dispatched.
    pub async fn run(&self) -> usize {
        info!(interval = ?self.config.interval, "auto-dispatch started");
        let mut dispatched = 0;

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!(dispatched, "auto-dispatch shutting down");
                    return dispatched;
                }
                _ = tokio::time::sleep(self.config.interval) => {}
            }

            if let Some(d) = self.tick() {
                dispatched += 1;
                log_dispatch(&d);
            }
        }
    }

    /// One dispatch attempt.
    pub fn tick(&self) -> Option<Dispatched> {
        let d = self.engine.dispatch_next();
        if d.is_none() {
            debug!("tick: queue empty");
        }
        d
    }
}

fn log_dispatch(d: &Dispatched) {
    match d.assigned_to {
        Some(ref agent_id) => info!(ticket_id = %d.ticket.id, agent_id = %agent_id, "tick: ticket dispatched"),
        None => info!(ticket_id = %d.ticket.id, "tick: ticket dispatched, no agent free"),
    }
}
