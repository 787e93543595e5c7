//! Side-effect callbacks emitted by the engine.
//!
//! The engine talks to the outside world through two injected interfaces:
//! a [`NotificationSink`] for urgent events (the desktop toast, a pager,
//! whatever the host wires in) and a [`ChangeObserver`] that receives the
//! full state after every mutation, for transport layers that push it to
//! clients.
//!
//! Both are called while the engine lock is held, so observers see
//! snapshots in the exact order mutations were applied. Implementations
//! must not block and must not call back into the engine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::model::{Agent, Ticket};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Full client-visible state. Enough for a transport layer to replace
/// everything it shows; there is no diffing contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSnapshot {
    /// Pending tickets in priority order.
    pub pending: Vec<Ticket>,
    /// Roster in registration order.
    pub agents: Vec<Agent>,
    /// Tickets linked to an agent.
    pub in_progress: Vec<Ticket>,
    /// Tickets popped by dispatch that found no compatible free agent.
    pub awaiting_agent: Vec<Ticket>,
}

// ---------------------------------------------------------------------------
// Interfaces
// ---------------------------------------------------------------------------

/// Receives urgent-event signals. Fire-and-forget: failures are the sink's
/// own business and never reach the engine's caller.
pub trait NotificationSink: Send + Sync {
    /// A ticket in the ServerDown / ProductionImpact tier was added or
    /// dispatched.
    fn urgent(&self, ticket: &Ticket);

    /// A ticket was escalated, whatever the resulting rank.
    fn escalated(&self, ticket_id: &str, new_rank: u32);
}

/// Receives the full state after every successful mutation.
pub trait ChangeObserver: Send + Sync {
    fn on_change(&self, snapshot: &DispatchSnapshot);
}

impl<F> ChangeObserver for F
where
    F: Fn(&DispatchSnapshot) + Send + Sync,
{
    fn on_change(&self, snapshot: &DispatchSnapshot) {
        self(snapshot)
    }
}

// ---------------------------------------------------------------------------
// Notifications as values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Urgent { ticket: Ticket },
    Escalated { ticket_id: String, new_rank: u32 },
}

impl Notification {
    pub fn title(&self) -> &'static str {
        match self {
            Notification::Urgent { .. } => "New urgent ticket",
            Notification::Escalated { .. } => "Ticket escalated",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Notification::Urgent { ticket } => format!(
                "{} ({}): {} [{}]",
                ticket.client_name, ticket.client_class, ticket.call_class, ticket.id
            ),
            Notification::Escalated {
                ticket_id,
                new_rank,
            } => format!("Ticket {ticket_id} now has priority {new_rank}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Adapters
// ---------------------------------------------------------------------------

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn urgent(&self, _ticket: &Ticket) {}
    fn escalated(&self, _ticket_id: &str, _new_rank: u32) {}
}

/// Discards every snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ChangeObserver for NoopObserver {
    fn on_change(&self, _snapshot: &DispatchSnapshot) {}
}

/// Writes notifications to the tracing pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn urgent(&self, ticket: &Ticket) {
        let n = Notification::Urgent {
            ticket: ticket.clone(),
        };
        warn!(
            ticket_id = %ticket.id,
            call_class = ticket.call_class.token(),
            "{}: {}",
            n.title(),
            n.message()
        );
    }

    fn escalated(&self, ticket_id: &str, new_rank: u32) {
        info!(ticket_id, new_rank, "Ticket escalated");
    }
}

/// Forwards notifications over an unbounded channel to whatever delivers
/// them (desktop toast, chat hook). Never blocks.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, n: Notification) {
        if self.tx.send(n).is_err() {
            debug!("notification receiver dropped, discarding");
        }
    }
}

impl NotificationSink for ChannelSink {
    fn urgent(&self, ticket: &Ticket) {
        self.send(Notification::Urgent {
            ticket: ticket.clone(),
        });
    }

    fn escalated(&self, ticket_id: &str, new_rank: u32) {
        self.send(Notification::Escalated {
            ticket_id: ticket_id.to_string(),
            new_rank,
        });
    }
}

/// Publishes snapshots to any number of subscribers. Slow subscribers lose
/// old snapshots rather than stalling dispatch; each snapshot is complete,
/// so the latest one is always enough.
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    tx: broadcast::Sender<Arc<DispatchSnapshot>>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DispatchSnapshot>> {
        self.tx.subscribe()
    }
}

impl ChangeObserver for BroadcastObserver {
    fn on_change(&self, snapshot: &DispatchSnapshot) {
        // No subscribers is fine.
        let _ = self.tx.send(Arc::new(snapshot.clone()));
    }
}
