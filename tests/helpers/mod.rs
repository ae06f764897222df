/// Test doubles to simulate the CAN transport, the CAN bus and the timer
/// during integration tests.
use std::collections::VecDeque;
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::Instant;
use korri_cbus::config::NodeConfig;
use korri_cbus::core::NodeMode;
use korri_cbus::infra::queue::FrameQueue;
use korri_cbus::infra::store::MemoryStore;
use korri_cbus::protocol::managment::node::{CbusNode, NodeHandler};
use korri_cbus::protocol::transport::{
    can_frame::CbusFrame,
    long_message::LongMessage,
    traits::{can_bus::CanBus, can_transport::CanTransport, cbus_timer::CbusTimer},
};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Duration};

#[allow(dead_code)]
pub const QUEUE_LEN: usize = 32;
#[allow(dead_code)]
pub type Queue = FrameQueue<NoopRawMutex, CbusFrame, QUEUE_LEN>;
#[allow(dead_code)]
pub type TestNode<'a> = CbusNode<'a, MockTransport, MemoryStore, Recorder, NoopRawMutex, QUEUE_LEN>;

/// Node number used by the FLiM fixtures (0x012C).
#[allow(dead_code)]
pub const NN: u16 = 300;

#[derive(Default)]
#[allow(dead_code)]
/// Polled transport: frames pushed to `rx` are picked up by the engine,
/// transmitted frames accumulate in `sent`.
pub struct MockTransport {
    pub rx: VecDeque<CbusFrame>,
    pub sent: Vec<CbusFrame>,
}

impl CanTransport for MockTransport {
    type Error = ();

    fn available(&mut self) -> bool {
        !self.rx.is_empty()
    }

    fn get_next_message(&mut self) -> Option<CbusFrame> {
        self.rx.pop_front()
    }

    fn send_message(&mut self, frame: &CbusFrame) -> Result<(), Self::Error> {
        self.sent.push(*frame);
        Ok(())
    }
}

#[derive(Default)]
#[allow(dead_code)]
/// Handler recording every callback.
pub struct Recorder {
    pub events: Vec<(u8, CbusFrame)>,
    pub frames: Vec<CbusFrame>,
    pub long_messages: Vec<LongMessage>,
    pub modes: Vec<NodeMode>,
    pub activity: usize,
}

impl NodeHandler for Recorder {
    fn on_event(&mut self, index: u8, frame: &CbusFrame) {
        self.events.push((index, *frame));
    }

    fn on_frame(&mut self, frame: &CbusFrame) {
        self.frames.push(*frame);
    }

    fn on_long_message(&mut self, message: &LongMessage) {
        self.long_messages.push(message.clone());
    }

    fn indicate_mode(&mut self, mode: NodeMode) {
        self.modes.push(mode);
    }

    fn indicate_activity(&mut self) {
        self.activity += 1;
    }
}

#[allow(dead_code)]
pub fn at(ms: u64) -> Instant {
    Instant::from_millis(ms)
}

#[allow(dead_code)]
/// Frame from another node.
pub fn frame(can_id: u8, opcode: u8, args: &[u8]) -> CbusFrame {
    CbusFrame::from_opcode(can_id, opcode, args)
}

#[allow(dead_code)]
pub fn node_with<'a>(queue: &'a Queue, store: MemoryStore, config: NodeConfig) -> TestNode<'a> {
    CbusNode::new(MockTransport::default(), store, Recorder::default(), queue, config)
}

#[allow(dead_code)]
/// FLiM node with CAN-ID 5 and node number [`NN`]; 8 events of 2 EVs, 4 NVs.
pub fn flim_node(queue: &Queue) -> TestNode<'_> {
    let store = MemoryStore::new(8, 2, 4).with_identity(NodeMode::Flim, 5, NN);
    node_with(queue, store, NodeConfig::default())
}

#[allow(dead_code)]
/// Fresh SLiM node.
pub fn slim_node(queue: &Queue) -> TestNode<'_> {
    node_with(queue, MemoryStore::new(8, 2, 4), NodeConfig::default())
}

#[allow(dead_code)]
pub fn take_sent(node: &mut TestNode<'_>) -> Vec<CbusFrame> {
    std::mem::take(&mut node.transport_mut().sent)
}

#[allow(dead_code)]
/// Queue `frames`, tick until every one is dispatched and return what the node sent.
pub fn deliver(node: &mut TestNode<'_>, queue: &Queue, frames: &[CbusFrame], now: Instant) -> Vec<CbusFrame> {
    for frame in frames {
        queue.enqueue(*frame).expect("test queue overflow");
    }
    while !queue.is_empty() {
        node.process(now);
    }
    take_sent(node)
}

#[derive(Clone)]
#[allow(dead_code)]
/// In-memory CAN bus reproducing the `CanBus` trait behavior.
pub struct MockCanBus {
    tx: mpsc::UnboundedSender<CbusFrame>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<CbusFrame>>>,
}

#[allow(dead_code)]
impl MockCanBus {
    /// Construct a pair of interconnected buses (DUT ↔ host).
    pub fn create_pair() -> (Self, Self) {
        let (dut_tx, host_rx) = mpsc::unbounded_channel();
        let (host_tx, dut_rx) = mpsc::unbounded_channel();

        let dut_bus = Self {
            tx: dut_tx,
            rx: Arc::new(Mutex::new(dut_rx)),
        };

        let host_bus = Self {
            tx: host_tx,
            rx: Arc::new(Mutex::new(host_rx)),
        };

        (dut_bus, host_bus)
    }
}

impl CanBus for MockCanBus {
    type Error = ();

    async fn send<'a>(&'a mut self, frame: &'a CbusFrame) -> Result<(), Self::Error> {
        self.tx.send(*frame).map_err(|_| ())?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<CbusFrame, Self::Error> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(())
    }
}

#[allow(dead_code)]
/// Timer based on `tokio::time::sleep` to drive delays in tests.
pub struct MockTimer;

impl CbusTimer for MockTimer {
    async fn delay_ms(&mut self, millis: u32) {
        sleep(Duration::from_millis(millis as u64)).await;
    }
}
