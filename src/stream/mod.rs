//! Long-lived streaming connections: registries, queues, framing, fan-out.

pub mod broadcast;
pub mod frame;
pub mod queue;
pub mod registry;
