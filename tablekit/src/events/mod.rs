//! Event vocabulary, batching and scheduling.

mod batch;
mod kind;
mod scheduler;

pub use batch::EventBatch;
pub use kind::{Event, EventKind, Payload, PayloadShape};
pub use scheduler::{Dispatcher, EventScheduler};
