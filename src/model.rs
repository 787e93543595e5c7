//! Core data model.
//!
//! A ticket is a unit of support work with urgency attributes and a
//! lifecycle state. An agent is a worker with a capability set who handles
//! at most one ticket at a time.

pub mod agent;
pub mod ticket;

pub use agent::{Agent, NewAgent};
pub use ticket::{
    CallClass, ClientClass, NewTicket, PriorityKey, Ticket, TicketStatus, URGENT_CALL_RANK,
};
