//! Error types for ticket-dispatch.

use thiserror::Error;

use crate::model::TicketStatus;

#[derive(Debug, Error)]
pub enum Error {
    /// Caller input was rejected at the engine boundary.
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("ticket {id} is {status}, expected {expected}")]
    InvalidState {
        id: String,
        status: TicketStatus,
        expected: TicketStatus,
    },

    /// Programming defect. The failed operation left no partial effect.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn ticket_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "ticket",
            id: id.to_string(),
        }
    }

    pub(crate) fn agent_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "agent",
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
