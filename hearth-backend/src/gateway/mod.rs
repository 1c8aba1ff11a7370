pub mod events;

pub use events::{FlowEvent, FlowEventBroadcaster};
