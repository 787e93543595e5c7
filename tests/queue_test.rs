//! Tests for the pending-ticket priority queue.

use chrono::{DateTime, Duration, TimeZone, Utc};
use ticket_dispatch::Error;
use ticket_dispatch::model::{CallClass, ClientClass, Ticket, TicketStatus};
use ticket_dispatch::queue::PriorityQueue;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn ticket(id: &str, call: CallClass, client: ClientClass, created_at: DateTime<Utc>) -> Ticket {
    Ticket {
        id: id.to_string(),
        client_name: format!("client of {id}"),
        description: String::new(),
        client_class: client,
        call_class: call,
        status: TicketStatus::Pending,
        created_at,
        manual_priority: None,
        assigned_agent: None,
        estimated_resolution: Duration::minutes(call.resolution_minutes()),
    }
}

fn drain(q: &mut PriorityQueue) -> Vec<String> {
    std::iter::from_fn(|| q.pop_min()).map(|t| t.id).collect()
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[test]
fn pops_by_call_rank_then_client_rank() {
    let mut q = PriorityQueue::new();
    q.insert(ticket("q-demo", CallClass::Question, ClientClass::Demo, at(0))).unwrap();
    q.insert(ticket("down-std", CallClass::ServerDown, ClientClass::Standard, at(1))).unwrap();
    q.insert(ticket("prod-prio", CallClass::ProductionImpact, ClientClass::Priority, at(2))).unwrap();
    q.insert(ticket("down-prio", CallClass::ServerDown, ClientClass::Priority, at(3))).unwrap();
    q.insert(ticket("none-std", CallClass::NoImpact, ClientClass::Standard, at(4))).unwrap();

    assert_eq!(
        drain(&mut q),
        ["down-prio", "down-std", "prod-prio", "none-std", "q-demo"]
    );
}

#[test]
fn equal_keys_pop_oldest_first() {
    let mut q = PriorityQueue::new();
    q.insert(ticket("late", CallClass::NoImpact, ClientClass::Standard, at(10))).unwrap();
    q.insert(ticket("early", CallClass::NoImpact, ClientClass::Standard, at(5))).unwrap();

    assert_eq!(drain(&mut q), ["early", "late"]);
}

#[test]
fn identical_key_and_timestamp_pop_in_insertion_order() {
    let mut q = PriorityQueue::new();
    for id in ["a", "b", "c", "d"] {
        q.insert(ticket(id, CallClass::Question, ClientClass::Standard, at(0))).unwrap();
    }

    assert_eq!(drain(&mut q), ["a", "b", "c", "d"]);
}

#[test]
fn empty_queue_is_not_an_error() {
    let mut q = PriorityQueue::new();
    assert!(q.peek_min().is_none());
    assert!(q.pop_min().is_none());
    assert!(q.is_empty());
}

#[test]
fn peek_does_not_remove() {
    let mut q = PriorityQueue::new();
    q.insert(ticket("a", CallClass::ServerDown, ClientClass::Demo, at(0))).unwrap();
    q.insert(ticket("b", CallClass::Question, ClientClass::Demo, at(0))).unwrap();

    assert_eq!(q.peek_min().unwrap().id, "a");
    assert_eq!(q.len(), 2);
    assert_eq!(q.pop_min().unwrap().id, "a");
    assert_eq!(q.peek_min().unwrap().id, "b");
}

#[test]
fn duplicate_insert_is_an_invariant_violation_and_changes_nothing() {
    let mut q = PriorityQueue::new();
    q.insert(ticket("dup", CallClass::Question, ClientClass::Standard, at(0))).unwrap();

    let err = q
        .insert(ticket("dup", CallClass::ServerDown, ClientClass::Priority, at(1)))
        .unwrap_err();
    assert!(matches!(err, Error::InvariantViolation(_)));

    assert_eq!(q.len(), 1);
    assert_eq!(q.peek_min().unwrap().call_class, CallClass::Question);
}

// ---------------------------------------------------------------------------
// Rekey / remove
// ---------------------------------------------------------------------------

#[test]
fn rekey_moves_ticket_ahead() {
    let mut q = PriorityQueue::new();
    q.insert(ticket("a", CallClass::ProductionImpact, ClientClass::Standard, at(0))).unwrap();
    q.insert(ticket("b", CallClass::Question, ClientClass::Standard, at(1))).unwrap();

    q.rekey("b", Some(1)).unwrap();

    assert_eq!(q.peek_min().unwrap().id, "b");
    assert_eq!(q.peek_min().unwrap().manual_priority, Some(1));
}

#[test]
fn rekey_keeps_original_seniority() {
    let mut q = PriorityQueue::new();
    // Same timestamp so only the insertion counter separates them.
    q.insert(ticket("first", CallClass::Question, ClientClass::Standard, at(0))).unwrap();
    q.insert(ticket("second", CallClass::Question, ClientClass::Standard, at(0))).unwrap();

    // Escalate the later one first, then the earlier one to the same rank.
    q.rekey("second", Some(1)).unwrap();
    q.rekey("first", Some(1)).unwrap();

    assert_eq!(drain(&mut q), ["first", "second"]);
}

#[test]
fn rekey_unknown_is_not_found() {
    let mut q = PriorityQueue::new();
    let err = q.rekey("nope", Some(1)).unwrap_err();
    assert!(matches!(err, Error::NotFound { kind: "ticket", .. }));
}

#[test]
fn remove_takes_out_one_ticket_and_keeps_order() {
    let mut q = PriorityQueue::new();
    q.insert(ticket("a", CallClass::ServerDown, ClientClass::Standard, at(0))).unwrap();
    q.insert(ticket("b", CallClass::ProductionImpact, ClientClass::Standard, at(1))).unwrap();
    q.insert(ticket("c", CallClass::NoImpact, ClientClass::Standard, at(2))).unwrap();

    let removed = q.remove("b").unwrap();
    assert_eq!(removed.id, "b");
    assert!(!q.contains("b"));
    assert_eq!(drain(&mut q), ["a", "c"]);
}

#[test]
fn remove_unknown_is_not_found() {
    let mut q = PriorityQueue::new();
    q.insert(ticket("a", CallClass::ServerDown, ClientClass::Standard, at(0))).unwrap();

    assert!(matches!(q.remove("zzz"), Err(Error::NotFound { .. })));
    assert_eq!(q.len(), 1);
}

#[test]
fn removed_id_can_be_inserted_again() {
    let mut q = PriorityQueue::new();
    q.insert(ticket("a", CallClass::ServerDown, ClientClass::Standard, at(0))).unwrap();
    q.remove("a").unwrap();
    q.insert(ticket("a", CallClass::Question, ClientClass::Standard, at(1))).unwrap();
    assert_eq!(q.len(), 1);
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[test]
fn snapshot_is_priority_ordered_and_read_only() {
    let mut q = PriorityQueue::new();
    q.insert(ticket("low", CallClass::Question, ClientClass::Demo, at(0))).unwrap();
    q.insert(ticket("high", CallClass::ServerDown, ClientClass::Priority, at(1))).unwrap();
    q.insert(ticket("mid", CallClass::NoImpact, ClientClass::Priority, at(2))).unwrap();

    let ids: Vec<String> = q.snapshot().into_iter().map(|t| t.id).collect();
    assert_eq!(ids, ["high", "mid", "low"]);
    assert_eq!(q.len(), 3);
    assert_eq!(q.get("mid").unwrap().call_class, CallClass::NoImpact);
}
