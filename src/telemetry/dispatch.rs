//! Dispatch operation span helpers.
//!
//! Every engine mutation runs inside an operation span; ticket lifecycle
//! changes are recorded as `state_transition` events scoped to it.

use tracing::Span;

use crate::model::TicketStatus;

/// Start a span for one engine operation.
///
/// The `ticket.id` field is declared empty and filled in by
/// [`record_ticket`] once the operation knows which ticket it touches.
pub fn operation_span(operation: &'static str) -> Span {
    tracing::info_span!(
        "dispatch.operation",
        "dispatch.operation" = operation,
        "ticket.id" = tracing::field::Empty,
    )
}

pub fn record_ticket(span: &Span, ticket_id: &str) {
    span.record("ticket.id", ticket_id);
}

/// Record a ticket state transition on the given span.
pub fn record_state_transition(
    span: &Span,
    ticket_id: &str,
    from: TicketStatus,
    to: TicketStatus,
    agent_id: Option<&str>,
) {
    span.in_scope(|| {
        tracing::info!(
            ticket_id,
            from = %from,
            to = %to,
            agent_id = agent_id.unwrap_or("-"),
            "state_transition"
        );
    });
}
