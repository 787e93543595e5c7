//! Metric instrument factories for ticket-dispatch.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without one installed every instrument is a no-op.

use opentelemetry::metrics::{Counter, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("ticket-dispatch")
}

/// Counter: tickets accepted by the engine.
/// Labels: `call_class`, `client_class`.
pub fn tickets_added() -> Counter<u64> {
    meter()
        .u64_counter("dispatch.tickets.added")
        .with_description("Number of tickets added")
        .build()
}

/// Counter: tickets rejected at the boundary.
/// Labels: `field`.
pub fn tickets_rejected() -> Counter<u64> {
    meter()
        .u64_counter("dispatch.tickets.rejected")
        .with_description("Number of ticket requests failing validation")
        .build()
}

/// Counter: dispatch attempts.
/// Labels: `result` ("assigned" | "unassigned" | "empty").
pub fn dispatches() -> Counter<u64> {
    meter()
        .u64_counter("dispatch.dispatches")
        .with_description("Number of dispatch-next calls")
        .build()
}

/// Counter: escalations.
pub fn escalations() -> Counter<u64> {
    meter()
        .u64_counter("dispatch.escalations")
        .with_description("Number of ticket escalations")
        .build()
}

/// Counter: manual assignments.
/// Labels: `bumped` ("true" | "false").
pub fn manual_assignments() -> Counter<u64> {
    meter()
        .u64_counter("dispatch.assignments.manual")
        .with_description("Number of operator assignments")
        .build()
}

/// Counter: resolved tickets.
pub fn completions() -> Counter<u64> {
    meter()
        .u64_counter("dispatch.completions")
        .with_description("Number of tickets resolved")
        .build()
}

/// Counter: automatic reassignments after completion.
pub fn reassignments() -> Counter<u64> {
    meter()
        .u64_counter("dispatch.reassignments")
        .with_description("Number of freed agents linked to a queued ticket")
        .build()
}

/// Counter: urgent notifications emitted.
/// Labels: `source` ("add" | "dispatch").
pub fn urgent_notifications() -> Counter<u64> {
    meter()
        .u64_counter("dispatch.notifications.urgent")
        .with_description("Number of urgent notifications emitted")
        .build()
}
