//! The dispatch engine. Owns the queue and the roster and is the only
//! thing that mutates tickets or agents.
//!
//! All state lives behind one mutex: every operation may touch the queue
//! and the roster together, so there is no finer-grained locking. Each
//! operation validates everything it needs before its first mutation, so a
//! failed call has no partial effect.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use opentelemetry::KeyValue;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{Span, debug, error, info, warn};

use crate::error::{Error, Result};
use crate::event::{ChangeObserver, DispatchSnapshot, NoopObserver, NoopSink, NotificationSink};
use crate::model::ticket::validate_rank;
use crate::model::{Agent, NewAgent, NewTicket, Ticket, TicketStatus};
use crate::queue::{PriorityQueue, QueueEntry};
use crate::telemetry::dispatch::{operation_span, record_state_transition, record_ticket};
use crate::telemetry::metrics;

/// Result of a successful `dispatch_next`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dispatched {
    pub ticket: Ticket,
    /// `None` when no free agent could handle the ticket. The ticket then
    /// waits outside the queue until an operator assigns it.
    pub assigned_to: Option<String>,
}

/// Result of a successful `complete_ticket`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub resolved: Ticket,
    pub resolved_by: String,
    /// The queued ticket the freed agent picked up, if any.
    pub reassigned: Option<Ticket>,
}

/// Handle to the dispatch engine. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct DispatchEngine {
    state: Arc<Mutex<DispatchState>>,
    sink: Arc<dyn NotificationSink>,
    observer: Arc<dyn ChangeObserver>,
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine").finish_non_exhaustive()
    }
}

impl DispatchEngine {
    pub fn new(sink: Arc<dyn NotificationSink>, observer: Arc<dyn ChangeObserver>) -> Self {
        Self {
            state: Arc::new(Mutex::new(DispatchState::default())),
            sink,
            observer,
        }
    }

    /// Engine with no collaborators attached.
    pub fn detached() -> Self {
        Self::new(Arc::new(NoopSink), Arc::new(NoopObserver))
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Add or replace an agent. Idempotent by id: the last registration's
    /// name and capabilities win outright. A live assignment is kept.
    pub fn register_agent(&self, new: NewAgent) -> Result<Agent> {
        new.validate()?;
        let mut state = self.state.lock();

        let agent = match state.agent_index(&new.id) {
            Some(idx) => {
                let agent = &mut state.agents[idx];
                agent.name = new.name;
                agent.capabilities = new.capabilities;
                debug!(agent_id = %agent.id, "agent re-registered");
                agent.clone()
            }
            None => {
                let agent = new.into_agent();
                state.agents.push(agent.clone());
                info!(agent_id = %agent.id, name = %agent.name, "agent registered");
                agent
            }
        };
        Ok(agent)
    }

    /// Validate a request, queue the ticket, and announce it.
    pub fn add_ticket(&self, new: NewTicket) -> Result<Ticket> {
        let span = operation_span("add_ticket");
        let _enter = span.enter();

        let valid = new.validate().inspect_err(|e| {
            if let Error::Validation { field, .. } = e {
                metrics::tickets_rejected().add(1, &[KeyValue::new("field", *field)]);
            }
        })?;

        let mut state = self.state.lock();
        let id = match valid.id.clone() {
            Some(id) if state.issued.contains(&id) => {
                return Err(Error::validation(
                    "id",
                    format!("ticket id {id} has already been used"),
                ));
            }
            Some(id) => id,
            None => state.generate_id(),
        };
        record_ticket(&span, &id);

        let ticket = new.into_ticket(valid, id, Utc::now());
        state.queue.insert(ticket.clone()).inspect_err(log_defect)?;
        state.issued.insert(ticket.id.clone());

        info!(
            ticket_id = %ticket.id,
            call_class = ticket.call_class.token(),
            client_class = ticket.client_class.token(),
            key = %ticket.priority_key(),
            "ticket queued"
        );
        metrics::tickets_added().add(
            1,
            &[
                KeyValue::new("call_class", ticket.call_class.token()),
                KeyValue::new("client_class", ticket.client_class.token()),
            ],
        );

        if ticket.is_urgent() {
            metrics::urgent_notifications().add(1, &[KeyValue::new("source", "add")]);
            self.sink.urgent(&ticket);
        }
        self.observer.on_change(&state.snapshot());
        Ok(ticket)
    }

    /// Override a ticket's call rank. A queued ticket is repositioned but
    /// keeps its seniority among tickets of the same key.
    pub fn escalate(&self, ticket_id: &str, new_rank: u32) -> Result<Ticket> {
        let span = operation_span("escalate");
        let _enter = span.enter();
        record_ticket(&span, ticket_id);

        validate_rank("rank", new_rank)?;
        let mut state = self.state.lock();

        let ticket = if state.queue.contains(ticket_id) {
            state.queue.rekey(ticket_id, Some(new_rank))?;
            state.queue.get(ticket_id).cloned()
        } else if let Some(entry) = state.in_progress.get_mut(ticket_id) {
            entry.ticket.manual_priority = Some(new_rank);
            Some(entry.ticket.clone())
        } else if let Some(entry) = state.awaiting.get_mut(ticket_id) {
            entry.ticket.manual_priority = Some(new_rank);
            Some(entry.ticket.clone())
        } else {
            None
        };
        let ticket = ticket.ok_or_else(|| Error::ticket_not_found(ticket_id))?;

        info!(ticket_id, new_rank, key = %ticket.priority_key(), "ticket escalated");
        metrics::escalations().add(1, &[]);

        self.sink.escalated(ticket_id, new_rank);
        self.observer.on_change(&state.snapshot());
        Ok(ticket)
    }

    /// Link a ticket to an agent on operator request. Capabilities are not
    /// checked. If the agent was serving another ticket, that ticket goes
    /// back to the queue with its original key and seniority.
    pub fn assign_agent(&self, ticket_id: &str, agent_id: &str) -> Result<Ticket> {
        let span = operation_span("assign_agent");
        let _enter = span.enter();
        record_ticket(&span, ticket_id);

        let mut state = self.state.lock();
        let agent_idx = state
            .agent_index(agent_id)
            .ok_or_else(|| Error::agent_not_found(agent_id))?;
        let location = state
            .locate(ticket_id)
            .ok_or_else(|| Error::ticket_not_found(ticket_id))?;

        let previous_owner = match location {
            Location::InProgress => state.in_progress[ticket_id].ticket.assigned_agent.clone(),
            _ => None,
        };
        if previous_owner.as_deref() == Some(agent_id) {
            debug!(ticket_id, agent_id, "ticket already assigned to agent");
            let ticket = state.in_progress[ticket_id].ticket.clone();
            self.observer.on_change(&state.snapshot());
            return Ok(ticket);
        }

        // Check everything before touching anything.
        let previous_owner_idx = match previous_owner {
            Some(ref owner) => Some(state.owner_index(owner, ticket_id).inspect_err(log_defect)?),
            None => None,
        };
        state
            .check_transition(ticket_id, TicketStatus::InProgress)
            .inspect_err(log_defect)?;
        let bumped_id = state.agents[agent_idx].current_ticket.clone();
        if let Some(ref bumped) = bumped_id {
            state.check_bumpable(bumped, agent_id).inspect_err(log_defect)?;
            state
                .check_transition(bumped, TicketStatus::Pending)
                .inspect_err(log_defect)?;
        }

        let entry = match location {
            Location::Queued => state.queue.remove_entry(ticket_id)?,
            Location::Awaiting => state
                .awaiting
                .remove(ticket_id)
                .ok_or_else(|| Error::ticket_not_found(ticket_id))?,
            Location::InProgress => {
                let entry = state
                    .in_progress
                    .remove(ticket_id)
                    .ok_or_else(|| Error::ticket_not_found(ticket_id))?;
                if let Some(idx) = previous_owner_idx {
                    state.agents[idx].current_ticket = None;
                }
                entry
            }
        };

        if let Some(ref bumped) = bumped_id {
            state.bump(bumped, &span)?;
        }
        let ticket = state.link(entry, agent_idx, &span)?;

        info!(
            ticket_id,
            agent_id,
            bumped = bumped_id.as_deref().unwrap_or("-"),
            "ticket assigned by operator"
        );
        metrics::manual_assignments().add(
            1,
            &[KeyValue::new("bumped", bumped_id.is_some().to_string())],
        );

        self.observer.on_change(&state.snapshot());
        Ok(ticket)
    }

    /// Pop the most urgent pending ticket and hand it to the first free
    /// agent, in registration order, that can handle its call class.
    ///
    /// Returns `None` when the queue is empty. A popped ticket with no
    /// compatible free agent stays pending but does not return to the
    /// queue; it waits for an operator assignment.
    pub fn dispatch_next(&self) -> Option<Dispatched> {
        let span = operation_span("dispatch_next");
        let _enter = span.enter();

        let mut state = self.state.lock();
        let Some(entry) = state.queue.pop_entry() else {
            metrics::dispatches().add(1, &[KeyValue::new("result", "empty")]);
            return None;
        };
        record_ticket(&span, &entry.ticket.id);

        let call_class = entry.ticket.call_class;
        let free_agent = state
            .agents
            .iter()
            .position(|a| a.is_available() && a.can_handle(call_class));

        let dispatched = match free_agent {
            Some(idx) => {
                if let Err(e) = transition_allowed(&entry.ticket, TicketStatus::InProgress) {
                    log_defect(&e);
                    if let Err(e) = state.queue.reinsert(entry) {
                        log_defect(&e);
                    }
                    return None;
                }
                let ticket = match state.link(entry, idx, &span) {
                    Ok(ticket) => ticket,
                    Err(e) => {
                        log_defect(&e);
                        return None;
                    }
                };
                let assigned_to = ticket.assigned_agent.clone();
                metrics::dispatches().add(1, &[KeyValue::new("result", "assigned")]);
                Dispatched {
                    ticket,
                    assigned_to,
                }
            }
            None => {
                warn!(
                    ticket_id = %entry.ticket.id,
                    call_class = call_class.token(),
                    "no free agent can handle ticket, awaiting assignment"
                );
                let ticket = entry.ticket.clone();
                state.awaiting.insert(ticket.id.clone(), entry);
                metrics::dispatches().add(1, &[KeyValue::new("result", "unassigned")]);
                Dispatched {
                    ticket,
                    assigned_to: None,
                }
            }
        };

        if dispatched.ticket.is_urgent() {
            metrics::urgent_notifications().add(1, &[KeyValue::new("source", "dispatch")]);
            self.sink.urgent(&dispatched.ticket);
        }
        self.observer.on_change(&state.snapshot());
        Some(dispatched)
    }

    /// Resolve an in-progress ticket, free its agent, and let the agent pick
    /// up the most urgent queued ticket it can handle.
    pub fn complete_ticket(&self, ticket_id: &str) -> Result<Completion> {
        let span = operation_span("complete_ticket");
        let _enter = span.enter();
        record_ticket(&span, ticket_id);

        let mut state = self.state.lock();
        let agent_id = match state.locate(ticket_id) {
            Some(Location::InProgress) => state.in_progress[ticket_id]
                .ticket
                .assigned_agent
                .clone()
                .ok_or_else(|| {
                    Error::InvariantViolation(format!(
                        "in-progress ticket {ticket_id} has no agent"
                    ))
                })
                .inspect_err(log_defect)?,
            Some(Location::Queued | Location::Awaiting) => {
                return Err(Error::InvalidState {
                    id: ticket_id.to_string(),
                    status: TicketStatus::Pending,
                    expected: TicketStatus::InProgress,
                });
            }
            None => return Err(Error::ticket_not_found(ticket_id)),
        };
        let agent_idx = state
            .owner_index(&agent_id, ticket_id)
            .inspect_err(log_defect)?;
        state
            .check_transition(ticket_id, TicketStatus::Resolved)
            .inspect_err(log_defect)?;

        let Some(entry) = state.in_progress.remove(ticket_id) else {
            return Err(Error::ticket_not_found(ticket_id));
        };
        let mut resolved = entry.ticket;
        resolved.status = TicketStatus::Resolved;
        resolved.assigned_agent = None;
        state.agents[agent_idx].current_ticket = None;
        record_state_transition(
            &span,
            ticket_id,
            TicketStatus::InProgress,
            TicketStatus::Resolved,
            Some(&agent_id),
        );
        metrics::completions().add(1, &[]);

        // The resolve stands even if the pickup is refused.
        let reassigned = state.reassign_next(agent_idx, &span).unwrap_or_else(|e| {
            log_defect(&e);
            None
        });
        match reassigned {
            Some(ref next) => {
                info!(agent_id = %agent_id, next_ticket = %next.id, "freed agent picked up queued ticket");
                metrics::reassignments().add(1, &[]);
            }
            None => debug!(agent_id = %agent_id, "no queued ticket for freed agent"),
        }

        self.observer.on_change(&state.snapshot());
        Ok(Completion {
            resolved,
            resolved_by: agent_id,
            reassigned,
        })
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> DispatchSnapshot {
        self.state.lock().snapshot()
    }

    /// An active ticket by id. Resolved tickets are gone.
    pub fn ticket(&self, ticket_id: &str) -> Option<Ticket> {
        self.state.lock().active_ticket(ticket_id).cloned()
    }

    pub fn agent(&self, agent_id: &str) -> Option<Agent> {
        let state = self.state.lock();
        state.agent_index(agent_id).map(|idx| state.agents[idx].clone())
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().queue.len()
    }
}

fn log_defect(e: &Error) {
    error!(error = %e, "dispatch invariant violated, operation aborted");
}

/// Gate every status change on the lifecycle table.
fn transition_allowed(ticket: &Ticket, to: TicketStatus) -> Result<()> {
    let from = ticket.status;
    if from.can_transition_to(to) {
        return Ok(());
    }
    let reason = if from.is_terminal() {
        "ticket is already closed"
    } else {
        "transition not allowed"
    };
    Err(Error::InvariantViolation(format!(
        "ticket {} cannot go from {from} to {to}: {reason}",
        ticket.id
    )))
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Where an active ticket currently lives. Every active ticket is in
/// exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Queued,
    InProgress,
    Awaiting,
}

#[derive(Debug, Default)]
struct DispatchState {
    queue: PriorityQueue,
    in_progress: HashMap<String, QueueEntry>,
    awaiting: HashMap<String, QueueEntry>,
    /// Registration order; first-fit matching walks it front to back.
    agents: Vec<Agent>,
    /// Every ticket id ever accepted, so none is reused.
    issued: HashSet<String>,
    last_generated: u64,
}

impl DispatchState {
    fn generate_id(&mut self) -> String {
        loop {
            self.last_generated += 1;
            let id = format!("INC-{}", self.last_generated);
            if !self.issued.contains(&id) {
                return id;
            }
        }
    }

    fn agent_index(&self, agent_id: &str) -> Option<usize> {
        self.agents.iter().position(|a| a.id == agent_id)
    }

    fn locate(&self, ticket_id: &str) -> Option<Location> {
        if self.queue.contains(ticket_id) {
            Some(Location::Queued)
        } else if self.in_progress.contains_key(ticket_id) {
            Some(Location::InProgress)
        } else if self.awaiting.contains_key(ticket_id) {
            Some(Location::Awaiting)
        } else {
            None
        }
    }

    fn active_ticket(&self, ticket_id: &str) -> Option<&Ticket> {
        self.queue
            .get(ticket_id)
            .or_else(|| self.in_progress.get(ticket_id).map(|e| &e.ticket))
            .or_else(|| self.awaiting.get(ticket_id).map(|e| &e.ticket))
    }

    fn check_transition(&self, ticket_id: &str, to: TicketStatus) -> Result<()> {
        let ticket = self
            .active_ticket(ticket_id)
            .ok_or_else(|| Error::ticket_not_found(ticket_id))?;
        transition_allowed(ticket, to)
    }

    /// Index of the agent that owns `ticket_id`, checking both ends of the
    /// link agree.
    fn owner_index(&self, agent_id: &str, ticket_id: &str) -> Result<usize> {
        match self.agent_index(agent_id) {
            Some(idx) if self.agents[idx].current_ticket.as_deref() == Some(ticket_id) => Ok(idx),
            Some(_) => Err(Error::InvariantViolation(format!(
                "ticket {ticket_id} names agent {agent_id}, which is not serving it"
            ))),
            None => Err(Error::InvariantViolation(format!(
                "ticket {ticket_id} names unknown agent {agent_id}"
            ))),
        }
    }

    fn check_bumpable(&self, ticket_id: &str, agent_id: &str) -> Result<()> {
        let linked = self
            .in_progress
            .get(ticket_id)
            .is_some_and(|e| e.ticket.assigned_agent.as_deref() == Some(agent_id));
        if !linked || self.queue.contains(ticket_id) {
            return Err(Error::InvariantViolation(format!(
                "agent {agent_id} points at ticket {ticket_id}, which is not in progress with it"
            )));
        }
        Ok(())
    }

    /// Move a ticket onto an agent. Callers check the transition before
    /// removing the entry from wherever it lived.
    fn link(&mut self, mut entry: QueueEntry, agent_idx: usize, span: &Span) -> Result<Ticket> {
        transition_allowed(&entry.ticket, TicketStatus::InProgress)?;
        let agent = &mut self.agents[agent_idx];
        let from = entry.ticket.status;
        entry.ticket.status = TicketStatus::InProgress;
        entry.ticket.assigned_agent = Some(agent.id.clone());
        agent.current_ticket = Some(entry.ticket.id.clone());

        record_state_transition(
            span,
            &entry.ticket.id,
            from,
            TicketStatus::InProgress,
            Some(&agent.id),
        );
        let ticket = entry.ticket.clone();
        self.in_progress.insert(ticket.id.clone(), entry);
        Ok(ticket)
    }

    /// Send an in-progress ticket back to the queue with its original
    /// seniority. The caller frees or relinks the agent.
    fn bump(&mut self, ticket_id: &str, span: &Span) -> Result<()> {
        self.check_transition(ticket_id, TicketStatus::Pending)?;
        let mut entry = self
            .in_progress
            .remove(ticket_id)
            .ok_or_else(|| Error::ticket_not_found(ticket_id))?;
        let agent_id = entry.ticket.assigned_agent.take();
        entry.ticket.status = TicketStatus::Pending;
        record_state_transition(
            span,
            ticket_id,
            TicketStatus::InProgress,
            TicketStatus::Pending,
            agent_id.as_deref(),
        );
        self.queue.reinsert(entry)
    }

    /// Ordered scan of the queue for the first ticket the agent can handle.
    /// Tickets passed over stay exactly where they are.
    fn reassign_next(&mut self, agent_idx: usize, span: &Span) -> Result<Option<Ticket>> {
        let agent = &self.agents[agent_idx];
        let Some(next_id) = self.queue.find_first(|t| agent.can_handle(t.call_class)) else {
            return Ok(None);
        };
        self.check_transition(&next_id, TicketStatus::InProgress)?;
        let entry = self.queue.remove_entry(&next_id)?;
        self.link(entry, agent_idx, span).map(Some)
    }

    fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            pending: self.queue.snapshot(),
            agents: self.agents.clone(),
            in_progress: by_seniority(&self.in_progress),
            awaiting_agent: by_seniority(&self.awaiting),
        }
    }
}

fn by_seniority(entries: &HashMap<String, QueueEntry>) -> Vec<Ticket> {
    let mut ordered: Vec<&QueueEntry> = entries.values().collect();
    ordered.sort_by_key(|e| e.seq);
    ordered.into_iter().map(|e| e.ticket.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CallClass, ClientClass};

    fn engine_with_agent() -> DispatchEngine {
        let engine = DispatchEngine::detached();
        engine
            .register_agent(NewAgent::new("a", "Ana", [CallClass::Question]))
            .unwrap();
        engine
    }

    fn add(engine: &DispatchEngine) -> Ticket {
        engine
            .add_ticket(NewTicket::of("Acme", ClientClass::Standard, CallClass::Question))
            .unwrap()
    }

    #[test]
    fn dispatch_refuses_closed_ticket_and_keeps_it_queued() {
        let engine = engine_with_agent();
        let t = add(&engine);
        {
            let mut state = engine.state.lock();
            let mut entry = state.queue.pop_entry().unwrap();
            entry.ticket.status = TicketStatus::Resolved;
            state.queue.reinsert(entry).unwrap();
        }

        assert!(engine.dispatch_next().is_none());
        assert_eq!(engine.pending_len(), 1);
        assert_eq!(engine.ticket(&t.id).unwrap().status, TicketStatus::Resolved);
        assert!(engine.agent("a").unwrap().is_available());
    }

    #[test]
    fn complete_refuses_disallowed_transition_without_effect() {
        let engine = engine_with_agent();
        let t = add(&engine);
        engine.dispatch_next().unwrap();
        engine
            .state
            .lock()
            .in_progress
            .get_mut(&t.id)
            .unwrap()
            .ticket
            .status = TicketStatus::Pending;

        let err = engine.complete_ticket(&t.id).unwrap_err();

        assert!(matches!(err, Error::InvariantViolation(_)));
        assert_eq!(engine.snapshot().in_progress.len(), 1);
        assert_eq!(
            engine.agent("a").unwrap().current_ticket.as_deref(),
            Some(t.id.as_str())
        );
    }

    #[test]
    fn assign_refuses_to_bump_closed_ticket() {
        let engine = engine_with_agent();
        let first = add(&engine);
        engine.dispatch_next().unwrap();
        let second = add(&engine);
        engine
            .state
            .lock()
            .in_progress
            .get_mut(&first.id)
            .unwrap()
            .ticket
            .status = TicketStatus::Resolved;

        let err = engine.assign_agent(&second.id, "a").unwrap_err();

        assert!(matches!(err, Error::InvariantViolation(_)));
        assert_eq!(engine.pending_len(), 1);
        assert_eq!(engine.ticket(&second.id).unwrap().status, TicketStatus::Pending);
        assert_eq!(
            engine.agent("a").unwrap().current_ticket.as_deref(),
            Some(first.id.as_str())
        );
    }

    #[test]
    fn closed_ticket_has_no_way_back() {
        let new = NewTicket::of("Acme", ClientClass::Demo, CallClass::Question);
        let valid = new.validate().unwrap();
        let mut t = new.into_ticket(valid, "INC-1".into(), Utc::now());
        t.status = TicketStatus::Resolved;

        let err = transition_allowed(&t, TicketStatus::InProgress).unwrap_err();
        assert!(err.to_string().contains("already closed"));
        assert!(transition_allowed(&t, TicketStatus::Pending).is_err());
    }
}
