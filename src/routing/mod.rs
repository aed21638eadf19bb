//! Routing-key side of the bus: the identifier normalization strategy, the
//! bounded per-subscriber queue, and the subscription registry that owns
//! every queue.

pub mod normalizer;
pub(crate) mod queue;
pub(crate) mod registry;
