//! The routing bus service: port lifecycle, subscription API, transmit
//! arbitration, blocking receive, and the interrupt-context notification
//! entry point.
//!
//! ## Execution domains
//!
//! Two surfaces with different legality rules, split by signature:
//!
//! * **Interrupt context** — [`CanRouter::notify`] (and the non-blocking
//!   [`CanRouter::transmit`]). These return without waiting, never allocate,
//!   and take only short critical sections.
//! * **Task context** — every `async` method. Waits are always bounded by an
//!   explicit budget (`REGISTRY_LOCK_BUDGET` for structural locks, the
//!   caller's timeout for receive).
//!
//! The registry's structural mutex is never held across a blocking queue
//! operation: lookups resolve to a handle under the lock, waits run against
//! the queue after release.
use embassy_time::{with_timeout, Duration, Instant};

use crate::core::{PortId, RxFifo, PORT_COUNT};
use crate::error::{
    ConfigError, DeinitError, InitError, LookupError, ReceiveError, RegisterError, TransmitError,
};
use crate::routing::normalizer::IdNormalizer;
use crate::routing::registry::Registry;
use crate::transport::frame::{FrameKind, Message, TxFrame};
use crate::transport::traits::can_controller::CanController;
use crate::transport::RX_BURST_LIMIT;

mod port;
mod tx_ring;

pub use port::{Event, EventHandler, EventKind, PortConfig};

use port::{PortSlot, PortState};

/// The message bus over up to [`PORT_COUNT`] CAN / CAN-FD controllers.
///
/// One instance serves the whole firmware; device drivers hold a shared
/// reference and interact purely through routing keys. Independent instances
/// can coexist (nothing is global), which is how the integration tests run
/// several buses side by side.
pub struct CanRouter<C: CanController> {
    ports: [PortSlot<C>; PORT_COUNT],
    registry: Registry,
}

impl<C: CanController> CanRouter<C> {
    pub fn new() -> Self {
        Self {
            ports: core::array::from_fn(|_| PortSlot::new()),
            registry: Registry::new(),
        }
    }

    fn port(&self, id: PortId) -> &PortSlot<C> {
        &self.ports[id.index()]
    }

    //==============================================================================LIFECYCLE

    /// Brings a port up: installs the controller, resets the callback table,
    /// clears the transmit ring, and installs the identity normalizer.
    ///
    /// A second call without an intervening [`deinit`](Self::deinit) fails
    /// and the running port is left untouched.
    pub fn init(&self, port: PortId, controller: C, config: PortConfig) -> Result<(), InitError> {
        self.port(port)
            .install(PortState::new(controller, config))
            .map_err(|_| InitError::AlreadyInitialized)
    }

    /// Tears a port down: destroys every registration belonging to it
    /// (waking their parked receivers with a closed result) and hands the
    /// controller back. The port returns to uninitialized.
    pub async fn deinit(&self, port: PortId) -> Result<C, DeinitError> {
        if !self.port(port).is_initialized() {
            return Err(DeinitError::NotInitialized);
        }
        self.registry
            .purge_port(port)
            .await
            .map_err(|_| DeinitError::LockTimeout)?;
        let state = self
            .port(port)
            .take()
            .ok_or(DeinitError::NotInitialized)?;
        Ok(state.controller)
    }

    /// Installs a user hook for one event class. The hook runs after the
    /// bus's own handling, in interrupt context; it must not wait.
    pub fn register_callback(
        &self,
        port: PortId,
        kind: EventKind,
        handler: EventHandler,
    ) -> Result<(), ConfigError> {
        self.port(port)
            .with_state(|state| state.callbacks.set(kind, handler))
            .ok_or(ConfigError::NotInitialized)
    }

    /// Replaces the port's identifier normalization strategy.
    ///
    /// Applies to every frame popped after the call; frames already in
    /// flight keep the key computed with the previous strategy.
    pub fn register_normalizer(
        &self,
        port: PortId,
        normalizer: IdNormalizer,
    ) -> Result<(), ConfigError> {
        self.port(port)
            .with_state(|state| state.normalizer = normalizer)
            .ok_or(ConfigError::NotInitialized)
    }

    //==============================================================================SUBSCRIPTIONS

    /// Subscribes `(port, key)` with a bounded queue of `capacity` messages
    /// (`0` substitutes the default depth). At most one registration per
    /// pair: a duplicate fails and the existing queue is unaffected.
    ///
    /// Registrations are independent of port lifecycle; a driver may
    /// subscribe before the port is brought up.
    pub async fn register_key(
        &self,
        port: PortId,
        key: u32,
        capacity: usize,
    ) -> Result<(), RegisterError> {
        self.registry.register(port, key, capacity).await
    }

    /// Destroys the `(port, key)` subscription. Queued messages are
    /// discarded; a receiver parked on the queue observes
    /// [`ReceiveError::Closed`].
    pub async fn unregister_key(&self, port: PortId, key: u32) -> Result<(), LookupError> {
        self.registry.unregister(port, key).await
    }

    /// Number of messages waiting behind `(port, key)`.
    pub async fn queue_depth(&self, port: PortId, key: u32) -> Result<usize, LookupError> {
        self.registry.depth(port, key).await
    }

    /// Discards every message waiting behind `(port, key)`.
    pub async fn flush(&self, port: PortId, key: u32) -> Result<(), LookupError> {
        self.registry.flush(port, key).await
    }

    /// Messages dropped for `(port, key)` since registration: queue-full
    /// drops are silent on the receive path, this counter is how a higher
    /// observability layer sees them.
    pub async fn dropped_count(&self, port: PortId, key: u32) -> Result<u32, LookupError> {
        self.registry.dropped(port, key).await
    }

    //==============================================================================RECEIVE

    /// Takes the next message routed to `(port, key)`.
    ///
    /// `timeout` semantics: a zero budget is a pure poll, `Some(d)` bounds
    /// the wait, `None` waits until a message arrives or the subscription is
    /// destroyed. Task context only.
    pub async fn receive(
        &self,
        port: PortId,
        key: u32,
        timeout: Option<Duration>,
    ) -> Result<Message, ReceiveError> {
        let handle = self
            .registry
            .lookup(port, key)
            .await
            .map_err(lookup_to_receive)?;
        let (queue, generation) = self.registry.queue(handle);

        match timeout {
            Some(budget) if budget.as_ticks() == 0 => match queue.try_pop(generation) {
                Ok(Some(message)) => Ok(message),
                Ok(None) => Err(ReceiveError::Timeout),
                Err(_) => Err(ReceiveError::Closed),
            },
            Some(budget) => match with_timeout(budget, queue.pop_wait(generation)).await {
                Ok(Ok(message)) => Ok(message),
                Ok(Err(_)) => Err(ReceiveError::Closed),
                Err(_) => Err(ReceiveError::Timeout),
            },
            None => queue
                .pop_wait(generation)
                .await
                .map_err(|_| ReceiveError::Closed),
        }
    }

    //==============================================================================TRANSMIT

    /// Hands a frame to the transmit path: straight into a free hardware
    /// mailbox when one exists, otherwise onto the port's software ring.
    ///
    /// Non-blocking. A saturated path (no free mailbox, ring full) returns
    /// [`TransmitError::Busy`]; the caller decides whether to back off and
    /// retry.
    pub fn transmit(
        &self,
        port: PortId,
        kind: FrameKind,
        id: u32,
        payload: &[u8],
    ) -> Result<(), TransmitError<C::Error>> {
        self.port(port)
            .with_state(|state| {
                let frame = TxFrame::new(kind, id, payload, state.config.mtu)?;
                if state.controller.free_mailboxes() > 0 {
                    state.controller.push_frame(&frame).map_err(TransmitError::Bus)
                } else if state.tx_ring.push(frame) {
                    Ok(())
                } else {
                    Err(TransmitError::Busy)
                }
            })
            .unwrap_or(Err(TransmitError::NotInitialized))
    }

    //==============================================================================NOTIFICATIONS

    /// Interrupt-context entry point for every controller notification.
    ///
    /// Receive-pending drains the named FIFO into subscriber queues;
    /// transmit-complete refills free mailboxes from the software ring;
    /// error and abort are forwarded untouched. The user hook registered for
    /// the event class runs last, outside the port's critical section.
    /// Uninitialized ports swallow notifications.
    pub fn notify(&self, port: PortId, event: Event) {
        match event {
            Event::ReceivePending(fifo) => self.dispatch_receive(port, fifo),
            Event::TransmitComplete => self.refill_mailboxes(port),
            Event::Error(_) | Event::Abort => {}
        }

        let handler = self
            .port(port)
            .with_state(|state| state.callbacks.get(event.kind()))
            .flatten();
        if let Some(handler) = handler {
            handler(port, event);
        }
    }

    /// Receive dispatcher. Pops at most [`RX_BURST_LIMIT`] frames per
    /// notification, one short critical section each; a FIFO left non-empty
    /// keeps its pending flag and the next notification continues.
    fn dispatch_receive(&self, port: PortId, fifo: RxFifo) {
        for _ in 0..RX_BURST_LIMIT {
            let popped = self.port(port).with_state(|state| {
                if state.controller.fifo_fill_level(fifo) == 0 {
                    None
                } else {
                    state
                        .controller
                        .pop_frame(fifo)
                        .map(|raw| (raw, state.normalizer))
                }
            });
            let Some(Some((raw, normalize))) = popped else {
                break;
            };

            let key = normalize(raw.header.raw_id(), raw.header.kind());
            let message = Message {
                header: raw.header,
                key,
                data: raw.data,
                timestamp: Instant::now(),
            };
            // Unmatched key, contended registry, and full queue all resolve
            // to a dropped message; the producer cannot wait or retry here.
            self.registry.route(port, key, message);
        }
    }

    /// Transmit arbiter refill. Empties the adapter's transmit-event records
    /// first, then moves ring frames into free mailboxes. This is the only
    /// path that drains the ring.
    fn refill_mailboxes(&self, port: PortId) {
        self.port(port).with_state(|state| {
            while state.controller.pop_tx_event().is_some() {}
            while state.controller.free_mailboxes() > 0 {
                let Some(frame) = state.tx_ring.pop() else {
                    break;
                };
                // A frame the hardware refuses at this point is lost; the
                // failure surfaces through the error notification.
                if state.controller.push_frame(&frame).is_err() {
                    break;
                }
            }
        });
    }
}

impl<C: CanController> Default for CanRouter<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lookup failures seen through the receive call.
fn lookup_to_receive(err: LookupError) -> ReceiveError {
    match err {
        LookupError::NotFound => ReceiveError::NotFound,
        LookupError::LockTimeout => ReceiveError::LockTimeout,
    }
}
