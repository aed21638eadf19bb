//! Subscription registry: a fixed arena of `(port, routing key)` slots, each
//! owning one bounded subscriber queue.
//!
//! Structural mutation (insert, remove, lookup) happens under one async
//! mutex, acquired with a bounded budget from task context and by `try_lock`
//! from the dispatch path. The lock is never held across a blocking queue
//! operation: lookups hand out a `{slot, generation}` handle and the caller
//! operates on the queue after release.
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::with_timeout;

use crate::core::PortId;
use crate::error::{LookupError, RegisterError};
use crate::routing::queue::{FrameQueue, QueueClosed};
use crate::transport::frame::Message;
use crate::transport::{MAX_SUBSCRIPTIONS, REGISTRY_LOCK_BUDGET};

/// The registry's structural lock could not be acquired within the budget.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct LockBudgetExceeded;

#[derive(Clone, Copy, PartialEq, Eq)]
struct Subscription {
    port: PortId,
    key: u32,
}

/// Slot occupancy, guarded by the structural lock. Queue payloads live
/// outside it so the dispatcher and receivers never contend on structure.
struct SubscriptionTable {
    entries: [Option<Subscription>; MAX_SUBSCRIPTIONS],
}

impl SubscriptionTable {
    const fn new() -> Self {
        Self {
            entries: [None; MAX_SUBSCRIPTIONS],
        }
    }

    fn position(&self, port: PortId, key: u32) -> Option<usize> {
        let wanted = Subscription { port, key };
        self.entries
            .iter()
            .position(|entry| *entry == Some(wanted))
    }
}

/// Capability to operate on one registration's queue. Valid only as long as
/// the generation matches; a destroyed registration turns every use into a
/// closed result.
#[derive(Debug, Clone, Copy)]
pub(crate) struct QueueHandle {
    index: usize,
    generation: u16,
}

/// Owner of every subscription slot and bounded queue.
pub(crate) struct Registry {
    table: Mutex<CriticalSectionRawMutex, SubscriptionTable>,
    queues: [FrameQueue; MAX_SUBSCRIPTIONS],
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            table: Mutex::new(SubscriptionTable::new()),
            queues: core::array::from_fn(|_| FrameQueue::new()),
        }
    }

    /// Inserts a registration for `(port, key)` with a fresh queue.
    pub(crate) async fn register(
        &self,
        port: PortId,
        key: u32,
        capacity: usize,
    ) -> Result<(), RegisterError> {
        let mut table = with_timeout(REGISTRY_LOCK_BUDGET, self.table.lock())
            .await
            .map_err(|_| RegisterError::LockTimeout)?;

        if table.position(port, key).is_some() {
            return Err(RegisterError::AlreadyRegistered);
        }
        let index = table
            .entries
            .iter()
            .position(Option::is_none)
            .ok_or(RegisterError::Exhausted)?;

        table.entries[index] = Some(Subscription { port, key });
        self.queues[index].open(capacity);
        Ok(())
    }

    /// Removes the registration and destroys its queue. A receiver parked on
    /// the queue is woken and observes the closure.
    pub(crate) async fn unregister(&self, port: PortId, key: u32) -> Result<(), LookupError> {
        let mut table = with_timeout(REGISTRY_LOCK_BUDGET, self.table.lock())
            .await
            .map_err(|_| LookupError::LockTimeout)?;

        let index = table.position(port, key).ok_or(LookupError::NotFound)?;
        table.entries[index] = None;
        self.queues[index].close();
        Ok(())
    }

    /// Removes every registration belonging to `port`.
    pub(crate) async fn purge_port(&self, port: PortId) -> Result<(), LockBudgetExceeded> {
        let mut table = with_timeout(REGISTRY_LOCK_BUDGET, self.table.lock())
            .await
            .map_err(|_| LockBudgetExceeded)?;

        for (index, entry) in table.entries.iter_mut().enumerate() {
            if entry.is_some_and(|s| s.port == port) {
                *entry = None;
                self.queues[index].close();
            }
        }
        Ok(())
    }

    /// Resolves `(port, key)` to a queue handle. The handle outlives the
    /// lock; generation checks keep it honest afterwards.
    pub(crate) async fn lookup(&self, port: PortId, key: u32) -> Result<QueueHandle, LookupError> {
        let table = with_timeout(REGISTRY_LOCK_BUDGET, self.table.lock())
            .await
            .map_err(|_| LookupError::LockTimeout)?;

        let index = table.position(port, key).ok_or(LookupError::NotFound)?;
        let generation = self.queues[index]
            .generation()
            .ok_or(LookupError::NotFound)?;
        Ok(QueueHandle { index, generation })
    }

    /// Queue behind a handle. Operations on it re-validate the generation.
    pub(crate) fn queue(&self, handle: QueueHandle) -> (&FrameQueue, u16) {
        (&self.queues[handle.index], handle.generation)
    }

    /// Dispatch-path delivery. Never waits: a contended structural lock, an
    /// unmatched key, and a full queue all resolve to a dropped message.
    pub(crate) fn route(&self, port: PortId, key: u32, message: Message) {
        let Ok(table) = self.table.try_lock() else {
            return;
        };
        let Some(index) = table.position(port, key) else {
            return;
        };
        self.queues[index].push(message);
    }

    /// Number of messages waiting behind `(port, key)`.
    pub(crate) async fn depth(&self, port: PortId, key: u32) -> Result<usize, LookupError> {
        let handle = self.lookup(port, key).await?;
        let (queue, generation) = self.queue(handle);
        queue.len(generation).map_err(closed_to_not_found)
    }

    /// Discards everything waiting behind `(port, key)`.
    pub(crate) async fn flush(&self, port: PortId, key: u32) -> Result<(), LookupError> {
        let handle = self.lookup(port, key).await?;
        let (queue, generation) = self.queue(handle);
        queue.flush(generation).map_err(closed_to_not_found)
    }

    /// Messages dropped on the floor for `(port, key)` since registration.
    pub(crate) async fn dropped(&self, port: PortId, key: u32) -> Result<u32, LookupError> {
        let handle = self.lookup(port, key).await?;
        let (queue, generation) = self.queue(handle);
        queue.dropped(generation).map_err(closed_to_not_found)
    }
}

/// A registration destroyed between lookup and use reads as not found.
fn closed_to_not_found(_: QueueClosed) -> LookupError {
    LookupError::NotFound
}
