//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (frame construction,
//! subscription lifecycle, receive, transmit, port lifecycle).
use thiserror_no_std::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors that can occur while building a frame header or payload.
pub enum FrameError {
    /// The raw identifier does not fit the requested identifier width
    /// (11 bits standard, 29 bits extended).
    #[error("Identifier out of range: {raw:#x}")]
    IdOutOfRange { raw: u32 },
    /// Payload length exceeds the maximum for the frame kind and MTU.
    #[error("Payload too long: {len} bytes, maximum {max}")]
    LengthTooLong { len: usize, max: usize },
    /// Length is not one of the on-wire length classes and rounding was not
    /// requested.
    #[error("Length {len} is not a valid length class")]
    NotALengthClass { len: usize },
}

//==================================================================================LIFECYCLE

#[derive(Error, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failure modes of `CanRouter::init`.
pub enum InitError {
    /// The port already holds a live controller. `deinit` first.
    #[error("Port already initialized")]
    AlreadyInitialized,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failure modes of `CanRouter::deinit`.
pub enum DeinitError {
    /// The port holds no controller.
    #[error("Port not initialized")]
    NotInitialized,
    /// The registry lock could not be acquired within the budget; no
    /// registration was removed and the port is still live.
    #[error("Registry lock timed out")]
    LockTimeout,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failure modes of callback and normalizer registration.
pub enum ConfigError {
    /// The port holds no controller.
    #[error("Port not initialized")]
    NotInitialized,
}

//==================================================================================ROUTING

#[derive(Error, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failure modes of `CanRouter::register_key`.
pub enum RegisterError {
    /// A subscription for this `(port, key)` pair already exists. The
    /// existing queue is left untouched.
    #[error("Routing key already registered")]
    AlreadyRegistered,
    /// Every subscription slot is occupied.
    #[error("Subscription table exhausted")]
    Exhausted,
    /// The registry lock could not be acquired within the budget.
    #[error("Registry lock timed out")]
    LockTimeout,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failure modes of the maintenance operations (`unregister_key`,
/// `queue_depth`, `flush`, `dropped_count`).
pub enum LookupError {
    /// No subscription exists for this `(port, key)` pair.
    #[error("Routing key not registered")]
    NotFound,
    /// The registry lock could not be acquired within the budget.
    #[error("Registry lock timed out")]
    LockTimeout,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failure modes of `CanRouter::receive`.
pub enum ReceiveError {
    /// No subscription exists for this `(port, key)` pair.
    #[error("Routing key not registered")]
    NotFound,
    /// The caller's wait budget elapsed with no message available.
    #[error("Receive timed out")]
    Timeout,
    /// The subscription was destroyed while this caller was waiting on it.
    #[error("Subscription closed")]
    Closed,
    /// The registry lock could not be acquired within the budget.
    #[error("Registry lock timed out")]
    LockTimeout,
}

//==================================================================================TRANSMIT

#[derive(Error, Debug)]
/// Failure modes of `CanRouter::transmit` (frame build + hand-off).
pub enum TransmitError<E: core::fmt::Debug> {
    /// Frame header or payload could not be built from the arguments.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// Every hardware mailbox is pending and the software ring is full.
    /// Real backpressure; the caller decides whether to back off and retry.
    #[error("Transmit path saturated")]
    Busy,
    /// The port holds no controller.
    #[error("Port not initialized")]
    NotInitialized,
    /// The controller refused the frame.
    #[error("Controller error: {0:?}")]
    Bus(E),
}
