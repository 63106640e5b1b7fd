//! Order life-cycle events.
//!
//! The order manager publishes an [`OrderCreatedEvent`] after a new order is stored, and an [`OrderNotifiedEvent`]
//! after a payment notification has been applied. Register hooks with [`EventHooks`], turn them into
//! [`EventHandlers`], and pass the handlers' [`EventProducers`] to the order manager.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
