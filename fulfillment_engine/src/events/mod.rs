//! Engine events.
//!
//! APIs publish events only after the transaction that caused them has committed. Subscribers register hooks with
//! [`EventHooks`], which [`EventHandlers`] turns into running handlers and the [`EventProducers`] handed to the APIs.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
