//! Bounded per-subscriber message queue.
//!
//! One queue sits in every subscription slot. The interrupt-side push never
//! waits: a full queue drops the incoming message and keeps the oldest ones
//! (overload protection, counted but silent). The task-side pop parks the
//! caller until a message arrives, the wait is cancelled by its timeout, or
//! the subscription is destroyed.
//!
//! A generation counter ties a lookup to one registration lifetime: a waiter
//! whose registration is destroyed observes a definitive closed result, even
//! if the slot is immediately reused for a different key.
use core::cell::RefCell;
use core::future::poll_fn;
use core::task::Poll;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::WakerRegistration;

use crate::transport::frame::Message;
use crate::transport::{DEFAULT_QUEUE_DEPTH, MAX_QUEUE_DEPTH};

/// The registration behind a queue handle no longer exists.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct QueueClosed;

struct QueueState {
    generation: u16,
    open: bool,
    capacity: usize,
    ring: [Option<Message>; MAX_QUEUE_DEPTH],
    head: usize,
    len: usize,
    dropped: u32,
    receiver: WakerRegistration,
}

impl QueueState {
    const fn new() -> Self {
        Self {
            generation: 0,
            open: false,
            capacity: 0,
            ring: [None; MAX_QUEUE_DEPTH],
            head: 0,
            len: 0,
            dropped: 0,
            receiver: WakerRegistration::new(),
        }
    }

    fn pop(&mut self) -> Option<Message> {
        if self.len == 0 {
            return None;
        }
        let message = self.ring[self.head].take();
        self.head = (self.head + 1) % MAX_QUEUE_DEPTH;
        self.len -= 1;
        message
    }

    fn clear(&mut self) {
        while self.pop().is_some() {}
    }
}

/// Interrupt-safe bounded queue with a single parked receiver.
pub(crate) struct FrameQueue {
    state: Mutex<CriticalSectionRawMutex, RefCell<QueueState>>,
}

impl FrameQueue {
    pub(crate) const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(QueueState::new())),
        }
    }

    /// Activates the queue for a fresh registration and returns the new
    /// generation. `capacity == 0` substitutes the default; requests above
    /// the backing ring clamp to it.
    pub(crate) fn open(&self, capacity: usize) -> u16 {
        let capacity = match capacity {
            0 => DEFAULT_QUEUE_DEPTH,
            n => n.min(MAX_QUEUE_DEPTH),
        };
        self.state.lock(|cell| {
            let mut queue = cell.borrow_mut();
            queue.generation = queue.generation.wrapping_add(1);
            queue.open = true;
            queue.capacity = capacity;
            queue.head = 0;
            queue.len = 0;
            queue.dropped = 0;
            queue.ring = [None; MAX_QUEUE_DEPTH];
            queue.generation
        })
    }

    /// Deactivates the queue, discarding its contents and waking a parked
    /// receiver so it observes the closure.
    pub(crate) fn close(&self) {
        self.state.lock(|cell| {
            let mut queue = cell.borrow_mut();
            queue.open = false;
            queue.clear();
            queue.receiver.wake();
        });
    }

    /// Generation of the live registration, if any. Only meaningful while
    /// the registry's structural lock pins the slot.
    pub(crate) fn generation(&self) -> Option<u16> {
        self.state.lock(|cell| {
            let queue = cell.borrow();
            queue.open.then_some(queue.generation)
        })
    }

    /// Non-blocking push from the dispatcher. A full queue drops `message`
    /// and keeps what is already queued; the drop is counted, not reported.
    pub(crate) fn push(&self, message: Message) {
        self.state.lock(|cell| {
            let mut queue = cell.borrow_mut();
            if !queue.open {
                return;
            }
            if queue.len == queue.capacity {
                queue.dropped = queue.dropped.saturating_add(1);
                return;
            }
            let tail = (queue.head + queue.len) % MAX_QUEUE_DEPTH;
            queue.ring[tail] = Some(message);
            queue.len += 1;
            queue.receiver.wake();
        });
    }

    /// Single poll: the front message, `Ok(None)` when empty, or the closed
    /// marker when `generation` no longer names the live registration.
    pub(crate) fn try_pop(&self, generation: u16) -> Result<Option<Message>, QueueClosed> {
        self.state.lock(|cell| {
            let mut queue = cell.borrow_mut();
            if !queue.open || queue.generation != generation {
                return Err(QueueClosed);
            }
            Ok(queue.pop())
        })
    }

    /// Parks the caller until a message arrives or the registration is
    /// destroyed. The caller bounds the wait externally.
    pub(crate) async fn pop_wait(&self, generation: u16) -> Result<Message, QueueClosed> {
        poll_fn(|cx| {
            self.state.lock(|cell| {
                let mut queue = cell.borrow_mut();
                if !queue.open || queue.generation != generation {
                    return Poll::Ready(Err(QueueClosed));
                }
                // Register before the check so a push between poll and park
                // still wakes this task.
                queue.receiver.register(cx.waker());
                match queue.pop() {
                    Some(message) => Poll::Ready(Ok(message)),
                    None => Poll::Pending,
                }
            })
        })
        .await
    }

    pub(crate) fn len(&self, generation: u16) -> Result<usize, QueueClosed> {
        self.state.lock(|cell| {
            let queue = cell.borrow();
            if !queue.open || queue.generation != generation {
                return Err(QueueClosed);
            }
            Ok(queue.len)
        })
    }

    pub(crate) fn flush(&self, generation: u16) -> Result<(), QueueClosed> {
        self.state.lock(|cell| {
            let mut queue = cell.borrow_mut();
            if !queue.open || queue.generation != generation {
                return Err(QueueClosed);
            }
            queue.clear();
            Ok(())
        })
    }

    /// Messages dropped on the floor since the registration was created.
    pub(crate) fn dropped(&self, generation: u16) -> Result<u32, QueueClosed> {
        self.state.lock(|cell| {
            let queue = cell.borrow();
            if !queue.open || queue.generation != generation {
                return Err(QueueClosed);
            }
            Ok(queue.dropped)
        })
    }
}
