//! Dispatch engine and the timer that drives it.

pub mod dispatch;
pub mod ticker;

pub use dispatch::{Completion, DispatchEngine, Dispatched};
pub use ticker::{AutoDispatcher, TickerConfig};
