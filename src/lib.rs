//! `ronin-can` library: a `no_std` CAN / CAN-FD routing bus for combat-robot
//! controller firmware. The crate turns a hardware controller's mailboxes and
//! receive FIFOs into an addressable message bus: device drivers subscribe to
//! routing keys, the dispatcher fans incoming frames out to per-subscriber
//! bounded queues, and a software ring arbitrates the transmit mailboxes.
#![no_std]
//==================================================================================
/// Identity types shared by every layer (ports, receive FIFOs).
pub mod core;
/// Failure types, one enum per concern (registration, lookup, receive,
/// transmit, lifecycle).
pub mod error;
/// Frame value types, the hardware adapter contract, and tuning constants.
pub mod transport;
/// Routing-key side: normalizer strategies, bounded subscriber queues, and
/// the subscription registry.
pub mod routing;
/// Per-port state and the public `CanRouter` service.
pub mod bus;
//==================================================================================
