/// Test doubles simulating one CAN controller: two receive FIFOs, a pool of
/// transmit mailboxes, and a transmit-event FIFO.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use ronin_can::core::RxFifo;
use ronin_can::transport::frame::{
    FrameHeader, FrameKind, Payload, ReceivedFrame, TxEvent, TxFrame,
};
use ronin_can::transport::traits::can_controller::CanController;

#[derive(Default)]
struct MockState {
    fifos: [VecDeque<ReceivedFrame>; 2],
    free_mailboxes: usize,
    sent: Vec<TxFrame>,
    tx_events: VecDeque<TxEvent>,
}

#[derive(Clone, Default)]
/// In-memory controller reproducing the `CanController` contract. Cloning
/// yields a second handle onto the same hardware state, so a test keeps one
/// handle while the router owns the other.
pub struct MockController {
    state: Arc<Mutex<MockState>>,
}

#[allow(dead_code)]
impl MockController {
    /// Controller with `free_mailboxes` empty transmit mailboxes.
    pub fn new(free_mailboxes: usize) -> Self {
        let controller = Self::default();
        controller.state.lock().unwrap().free_mailboxes = free_mailboxes;
        controller
    }

    /// Queue a frame in the given hardware receive FIFO, as the wire would.
    pub fn inject(&self, fifo: RxFifo, frame: ReceivedFrame) {
        self.state.lock().unwrap().fifos[fifo_index(fifo)].push_back(frame);
    }

    /// Frames still waiting in the given receive FIFO.
    pub fn fifo_len(&self, fifo: RxFifo) -> usize {
        self.state.lock().unwrap().fifos[fifo_index(fifo)].len()
    }

    /// Every frame handed to a mailbox so far, in hand-off order.
    pub fn sent(&self) -> Vec<TxFrame> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().unwrap().sent.len()
    }

    /// Simulate one mailbox finishing: the slot frees up and a transmit
    /// event is recorded for the arbiter to drain.
    pub fn complete_one(&self) {
        let mut state = self.state.lock().unwrap();
        state.free_mailboxes += 1;
        state.tx_events.push_back(TxEvent { marker: 0 });
    }

    pub fn pending_tx_events(&self) -> usize {
        self.state.lock().unwrap().tx_events.len()
    }
}

impl CanController for MockController {
    type Error = ();

    fn fifo_fill_level(&mut self, fifo: RxFifo) -> usize {
        self.state.lock().unwrap().fifos[fifo_index(fifo)].len()
    }

    fn pop_frame(&mut self, fifo: RxFifo) -> Option<ReceivedFrame> {
        self.state.lock().unwrap().fifos[fifo_index(fifo)].pop_front()
    }

    fn free_mailboxes(&mut self) -> usize {
        self.state.lock().unwrap().free_mailboxes
    }

    fn push_frame(&mut self, frame: &TxFrame) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        if state.free_mailboxes == 0 {
            return Err(());
        }
        state.free_mailboxes -= 1;
        state.sent.push(*frame);
        Ok(())
    }

    fn pop_tx_event(&mut self) -> Option<TxEvent> {
        self.state.lock().unwrap().tx_events.pop_front()
    }
}

fn fifo_index(fifo: RxFifo) -> usize {
    match fifo {
        RxFifo::Fifo0 => 0,
        RxFifo::Fifo1 => 1,
    }
}

#[allow(dead_code)]
/// Wire frame as the adapter would pop it from a receive FIFO.
pub fn wire_frame(kind: FrameKind, raw_id: u32, payload: &[u8]) -> ReceivedFrame {
    ReceivedFrame {
        header: FrameHeader::new(kind, raw_id).expect("test identifier must fit the kind"),
        data: Payload::new_padded(payload).expect("test payload must fit a frame"),
    }
}
