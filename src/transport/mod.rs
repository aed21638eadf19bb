//! Transport layer: frame value types, the hardware adapter contract, and
//! the tuning constants of the routing bus.
//!
//! ## Tuning Constants
//!
//! These constants bound every buffer and every wait in the layer. They are
//! compile-time fixed so that the whole bus is allocation-free after startup.

use embassy_time::Duration;

pub mod frame;
pub mod traits;

/// Maximum frames drained from one hardware FIFO per receive notification.
///
/// The dispatcher runs in interrupt context; an unbounded drain loop on a
/// flooded bus would starve every other interrupt of the same priority. If
/// frames remain past the budget, the FIFO keeps its pending flag and the
/// next notification continues the drain.
///
/// 32 covers the deepest receive FIFO in the supported controller families,
/// so in practice a single notification empties the FIFO.
pub const RX_BURST_LIMIT: usize = 32;

/// Depth of the software transmit ring per controller.
///
/// One slot is sacrificed to distinguish full from empty, leaving
/// `TX_RING_DEPTH - 1` usable entries. Sized for a burst of one full motor
/// command cycle (all drivers publishing in the same control tick) on top of
/// the three hardware mailboxes.
pub const TX_RING_DEPTH: usize = 16;

/// Total subscription slots across all ports.
///
/// Each motor controller, IMU, encoder, or remote bridge takes one slot per
/// routing key it listens on. The table is a fixed arena; registration never
/// allocates.
pub const MAX_SUBSCRIPTIONS: usize = 32;

/// Queue capacity substituted when `register_key` is called with `0`.
pub const DEFAULT_QUEUE_DEPTH: usize = 8;

/// Hard upper bound on a subscriber queue's capacity. Requests above it are
/// clamped; the backing ring is this deep in every slot.
pub const MAX_QUEUE_DEPTH: usize = 32;

/// Budget for acquiring the registry's structural lock from task context.
///
/// Registration, unregistration, and lookups fail fast with a timeout error
/// instead of blocking indefinitely behind a stuck task. Interrupt context
/// never waits at all: the dispatch path uses a try-lock and drops the frame
/// on contention.
pub const REGISTRY_LOCK_BUDGET: Duration = Duration::from_millis(100);
