//! Minimal abstraction over one physical CAN / CAN-FD controller. Allows the
//! routing bus to plug into various peripheral wrappers (FDCAN, bxCAN, test
//! doubles) without knowing register layouts.
use crate::core::RxFifo;
use crate::transport::frame::{ReceivedFrame, TxEvent, TxFrame};

/// Contract the routing bus consumes from a peripheral wrapper.
///
/// Every method is called from interrupt context under the port's critical
/// section and must return without waiting. The wrapper is expected to fire
/// the bus's [`notify`](crate::bus::CanRouter::notify) entry point from its
/// receive-pending, transmit-complete, error, and abort interrupt sources.
pub trait CanController {
    type Error: core::fmt::Debug;

    /// Number of frames currently held in the given receive FIFO.
    fn fifo_fill_level(&mut self, fifo: RxFifo) -> usize;

    /// Pop one frame from the given receive FIFO. `None` when the FIFO is
    /// empty or the hardware reports a read error; the dispatcher stops
    /// draining either way.
    fn pop_frame(&mut self, fifo: RxFifo) -> Option<ReceivedFrame>;

    /// Number of transmit mailboxes ready to accept a frame.
    fn free_mailboxes(&mut self) -> usize;

    /// Hand a frame to a free transmit mailbox.
    fn push_frame(&mut self, frame: &TxFrame) -> Result<(), Self::Error>;

    /// Drain one record from the transmit-event FIFO, if any. The arbiter
    /// empties this before refilling mailboxes so the event source itself
    /// cannot stall.
    fn pop_tx_event(&mut self) -> Option<TxEvent>;
}
