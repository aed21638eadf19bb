//! Per-port state: the event model, the user callback table, and the
//! interrupt-shared cell holding a live controller between `init` and
//! `deinit`.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::core::{PortId, RxFifo};
use crate::routing::normalizer::{identity_normalizer, IdNormalizer};
use crate::transport::frame::Mtu;
use crate::transport::TX_RING_DEPTH;

use super::tx_ring::TxRing;

//==================================================================================EVENTS

/// Notification classes a controller can raise. Indexes the callback table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventKind {
    ReceivePending,
    TransmitComplete,
    Error,
    Abort,
}

impl EventKind {
    pub(crate) const COUNT: usize = 4;

    pub(crate) const fn index(self) -> usize {
        match self {
            EventKind::ReceivePending => 0,
            EventKind::TransmitComplete => 1,
            EventKind::Error => 2,
            EventKind::Abort => 3,
        }
    }
}

/// One controller notification, as delivered to
/// [`notify`](crate::bus::CanRouter::notify) by the peripheral wrapper's
/// interrupt glue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Frames are waiting in the given receive FIFO.
    ReceivePending(RxFifo),
    /// At least one transmit mailbox finished its frame.
    TransmitComplete,
    /// Hardware error, carrying the controller family's raw error code.
    /// The bus forwards it untouched; classification is the handler's job.
    Error(u32),
    /// A transmission was aborted by the hardware.
    Abort,
}

impl Event {
    pub const fn kind(&self) -> EventKind {
        match self {
            Event::ReceivePending(_) => EventKind::ReceivePending,
            Event::TransmitComplete => EventKind::TransmitComplete,
            Event::Error(_) => EventKind::Error,
            Event::Abort => EventKind::Abort,
        }
    }
}

/// User hook invoked after the bus's own handling of an event. Runs in
/// interrupt context, outside the port's critical section; it must not wait.
pub type EventHandler = fn(PortId, Event);

/// Per-port handler slots, reset at `init`, written only by
/// `register_callback`, read from interrupt context.
pub(crate) struct CallbackTable {
    handlers: [Option<EventHandler>; EventKind::COUNT],
}

impl CallbackTable {
    pub(crate) const fn new() -> Self {
        Self {
            handlers: [None; EventKind::COUNT],
        }
    }

    pub(crate) fn set(&mut self, kind: EventKind, handler: EventHandler) {
        self.handlers[kind.index()] = Some(handler);
    }

    pub(crate) fn get(&self, kind: EventKind) -> Option<EventHandler> {
        self.handlers[kind.index()]
    }
}

//==================================================================================PORT_STATE

/// Static configuration a port is initialized with.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortConfig {
    pub mtu: Mtu,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self { mtu: Mtu::Classic }
    }
}

/// Everything a live port owns: the adapter, its configuration, the user
/// callback table, the software transmit ring, and the normalizer strategy.
pub(crate) struct PortState<C> {
    pub(crate) controller: C,
    pub(crate) config: PortConfig,
    pub(crate) callbacks: CallbackTable,
    pub(crate) tx_ring: TxRing<TX_RING_DEPTH>,
    pub(crate) normalizer: IdNormalizer,
}

impl<C> PortState<C> {
    pub(crate) fn new(controller: C, config: PortConfig) -> Self {
        Self {
            controller,
            config,
            callbacks: CallbackTable::new(),
            tx_ring: TxRing::new(),
            normalizer: identity_normalizer,
        }
    }
}

/// Interrupt-shared cell for one port slot. Empty while uninitialized.
pub(crate) struct PortSlot<C> {
    state: Mutex<CriticalSectionRawMutex, RefCell<Option<PortState<C>>>>,
}

impl<C> PortSlot<C> {
    pub(crate) const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(None)),
        }
    }

    /// Installs a fresh state. Returns it unchanged if the slot is occupied.
    pub(crate) fn install(&self, state: PortState<C>) -> Result<(), PortState<C>> {
        self.state.lock(|cell| {
            let mut slot = cell.borrow_mut();
            if slot.is_some() {
                Err(state)
            } else {
                *slot = Some(state);
                Ok(())
            }
        })
    }

    /// Removes and returns the state, leaving the slot uninitialized.
    pub(crate) fn take(&self) -> Option<PortState<C>> {
        self.state.lock(|cell| cell.borrow_mut().take())
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.state.lock(|cell| cell.borrow().is_some())
    }

    /// Runs `f` on the live state under the port's critical section.
    /// `None` when the port is uninitialized.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut PortState<C>) -> R) -> Option<R> {
        self.state.lock(|cell| cell.borrow_mut().as_mut().map(f))
    }
}
