//! # ticket-dispatch
//!
//! Support-ticket dispatch engine. Tickets are ordered by a composite
//! urgency key and handed to qualified agents first-fit; a freed agent
//! immediately picks up the most urgent queued ticket it can handle.
//!
//! Transports (HTTP, WebSocket, desktop toasts) sit outside the crate and
//! plug in through [`event::NotificationSink`] and
//! [`event::ChangeObserver`].

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod model;
pub mod queue;
pub mod roster;
pub mod telemetry;

pub use engine::{Completion, DispatchEngine, Dispatched};
pub use error::{Error, Result};
