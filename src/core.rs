//! Small identity types shared across the crate: which physical controller a
//! value belongs to, and which hardware receive FIFO it came from.

/// Number of controller slots a router carries. Slots beyond the fitted
/// hardware simply stay uninitialized.
pub const PORT_COUNT: usize = 3;

/// Identity of one physical CAN / CAN-FD controller.
///
/// A port slot exists for the whole life of the router; it is only usable
/// between `init` and `deinit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortId {
    Can1,
    Can2,
    Can3,
}

impl PortId {
    /// Array index of this port inside the router.
    pub const fn index(self) -> usize {
        match self {
            PortId::Can1 => 0,
            PortId::Can2 => 1,
            PortId::Can3 => 2,
        }
    }
}

/// Hardware receive FIFO selector. Controllers in the supported families
/// expose two receive FIFOs, each drained by its own notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxFifo {
    Fifo0,
    Fifo1,
}
