//! Pending-ticket priority queue.
//!
//! Orders tickets by `(priority key, created_at, seq)`, lowest first. `seq`
//! is a per-queue insertion counter that only breaks ties; it stays with a
//! ticket through rekeys and through a bump back into the queue, so a ticket
//! never loses seniority to same-key tickets that arrived after it.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{PriorityKey, Ticket};

/// A ticket plus its tie-break counter.
#[derive(Debug, Clone)]
pub(crate) struct QueueEntry {
    pub ticket: Ticket,
    pub seq: u64,
}

impl QueueEntry {
    fn sort_key(&self) -> (PriorityKey, DateTime<Utc>, u64) {
        (self.ticket.priority_key(), self.ticket.created_at, self.seq)
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // Reversed: BinaryHeap is a max-heap and we want the lowest key on top.
    fn cmp(&self, other: &Self) -> Ordering {
        other.sort_key().cmp(&self.sort_key())
    }
}

/// Min-priority queue of pending tickets.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    heap: BinaryHeap<QueueEntry>,
    ids: HashSet<String>,
    next_seq: u64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Insert a ticket with a fresh tie-break counter. O(log n).
    ///
    /// A duplicate id is a caller defect and is reported as
    /// `InvariantViolation`; the queue is left unchanged.
    pub fn insert(&mut self, ticket: Ticket) -> Result<()> {
        let seq = self.next_seq;
        self.push(QueueEntry { ticket, seq })?;
        self.next_seq += 1;
        Ok(())
    }

    /// Put a previously popped entry back with its original counter.
    pub(crate) fn reinsert(&mut self, entry: QueueEntry) -> Result<()> {
        self.push(entry)
    }

    fn push(&mut self, entry: QueueEntry) -> Result<()> {
        if self.ids.contains(&entry.ticket.id) {
            return Err(Error::InvariantViolation(format!(
                "ticket {} is already queued",
                entry.ticket.id
            )));
        }
        self.ids.insert(entry.ticket.id.clone());
        self.heap.push(entry);
        Ok(())
    }

    pub fn peek_min(&self) -> Option<&Ticket> {
        self.heap.peek().map(|e| &e.ticket)
    }

    pub fn pop_min(&mut self) -> Option<Ticket> {
        self.pop_entry().map(|e| e.ticket)
    }

    pub(crate) fn pop_entry(&mut self) -> Option<QueueEntry> {
        let entry = self.heap.pop()?;
        self.ids.remove(&entry.ticket.id);
        Some(entry)
    }

    pub fn get(&self, id: &str) -> Option<&Ticket> {
        if !self.contains(id) {
            return None;
        }
        self.heap
            .iter()
            .find(|e| e.ticket.id == id)
            .map(|e| &e.ticket)
    }

    /// Change a ticket's manual priority and reposition it. O(n).
    pub fn rekey(&mut self, id: &str, manual_priority: Option<u32>) -> Result<()> {
        if !self.contains(id) {
            return Err(Error::ticket_not_found(id));
        }
        let mut entries = std::mem::take(&mut self.heap).into_vec();
        if let Some(entry) = entries.iter_mut().find(|e| e.ticket.id == id) {
            entry.ticket.manual_priority = manual_priority;
        }
        self.heap = BinaryHeap::from(entries);
        Ok(())
    }

    /// Remove an arbitrary ticket. O(n).
    pub fn remove(&mut self, id: &str) -> Result<Ticket> {
        self.remove_entry(id).map(|e| e.ticket)
    }

    pub(crate) fn remove_entry(&mut self, id: &str) -> Result<QueueEntry> {
        if !self.contains(id) {
            return Err(Error::ticket_not_found(id));
        }
        let mut entries = std::mem::take(&mut self.heap).into_vec();
        let pos = entries.iter().position(|e| e.ticket.id == id);
        let removed = pos.map(|pos| entries.swap_remove(pos));
        self.heap = BinaryHeap::from(entries);
        match removed {
            Some(entry) => {
                self.ids.remove(id);
                Ok(entry)
            }
            None => Err(Error::InvariantViolation(format!(
                "ticket {id} indexed but missing from heap"
            ))),
        }
    }

    /// First ticket in priority order matching `pred`, without removing it.
    pub(crate) fn find_first(&self, pred: impl Fn(&Ticket) -> bool) -> Option<String> {
        self.ordered()
            .into_iter()
            .find(|e| pred(&e.ticket))
            .map(|e| e.ticket.id.clone())
    }

    /// All pending tickets in priority order.
    pub fn snapshot(&self) -> Vec<Ticket> {
        self.ordered()
            .into_iter()
            .map(|e| e.ticket.clone())
            .collect()
    }

    fn ordered(&self) -> Vec<&QueueEntry> {
        let mut entries: Vec<&QueueEntry> = self.heap.iter().collect();
        // Heap order is reversed; sorting descending by it yields lowest key first.
        entries.sort_by(|a, b| b.cmp(a));
        entries
    }
}
