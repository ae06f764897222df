//! Async runner over a mock CAN bus: reception, ticking and transmission.
mod helpers;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use helpers::{frame, MockCanBus, MockTimer, Recorder, NN};
use korri_cbus::config::NodeConfig;
use korri_cbus::core::{NodeMode, Polarity};
use korri_cbus::infra::queue::FrameQueue;
use korri_cbus::infra::store::MemoryStore;
use korri_cbus::protocol::managment::node::CbusNode;
use korri_cbus::protocol::managment::supervisor::{NodeRunner, QueuedTransport};
use korri_cbus::protocol::opcodes::*;
use korri_cbus::protocol::transport::can_frame::CbusFrame;
use korri_cbus::protocol::transport::traits::can_bus::CanBus;
use korri_cbus::protocol::transport::traits::config_store::ConfigStore;
use tokio::time::{timeout, Duration};

#[tokio::test]
/// A query sent by the host is answered through the runner.
async fn test_runner_answers_query() {
    let inbound = FrameQueue::<NoopRawMutex, CbusFrame, 16>::new();
    let outbound = FrameQueue::<NoopRawMutex, CbusFrame, 16>::new();
    let (dut_bus, mut host_bus) = MockCanBus::create_pair();

    let store = MemoryStore::new(4, 1, 1).with_identity(NodeMode::Flim, 7, NN);
    let node = CbusNode::new(
        QueuedTransport::new(&outbound),
        store,
        Recorder::default(),
        &inbound,
        NodeConfig::default(),
    );
    let mut runner = NodeRunner::new(dut_bus, MockTimer, node, &inbound, &outbound);

    host_bus.send(&frame(120, QNN, &[])).await.unwrap();
    runner.tick().await.unwrap();

    let reply = timeout(Duration::from_millis(200), host_bus.recv())
        .await
        .expect("no reply from node")
        .unwrap();
    assert_eq!(reply.payload(), [PNN, 0x01, 0x2C, 165, 0xFF, 0x07]);
    assert_eq!(reply.can_id(), 7);
    assert_eq!(runner.node().counters().received, 1);
}

#[tokio::test]
/// Operator sends made between ticks are flushed on the next tick, even with an idle bus.
async fn test_runner_flushes_operator_frames() {
    let inbound = FrameQueue::<NoopRawMutex, CbusFrame, 16>::new();
    let outbound = FrameQueue::<NoopRawMutex, CbusFrame, 16>::new();
    let (dut_bus, mut host_bus) = MockCanBus::create_pair();

    let store = MemoryStore::new(4, 1, 1).with_identity(NodeMode::Flim, 7, NN);
    let node = CbusNode::new(
        QueuedTransport::new(&outbound),
        store,
        Recorder::default(),
        &inbound,
        NodeConfig::default(),
    );
    let mut runner = NodeRunner::new(dut_bus, MockTimer, node, &inbound, &outbound);

    runner.node_mut().send_event(Polarity::On, 25).unwrap();
    assert_eq!(outbound.len(), 1);
    runner.tick().await.unwrap();
    assert!(outbound.is_empty());

    let event = timeout(Duration::from_millis(200), host_bus.recv())
        .await
        .expect("event not transmitted")
        .unwrap();
    assert_eq!(event.as_tuple(), (1, NN, 25));
    assert_eq!(event.as_short_code().as_deref(), Some("+N300E25"));
}

#[tokio::test]
/// A NERD listing longer than the outbound queue is paged to the bus without losses.
async fn test_runner_pages_long_event_listing() {
    let inbound = FrameQueue::<NoopRawMutex, CbusFrame, 16>::new();
    let outbound = FrameQueue::<NoopRawMutex, CbusFrame, 16>::new();
    let (dut_bus, mut host_bus) = MockCanBus::create_pair();

    let mut store = MemoryStore::new(32, 1, 1).with_identity(NodeMode::Flim, 7, NN);
    for event in 1..=24 {
        assert!(store.write_event(0x0200, event, 1, 1));
    }
    let node = CbusNode::new(
        QueuedTransport::new(&outbound),
        store,
        Recorder::default(),
        &inbound,
        NodeConfig::default(),
    );
    let mut runner = NodeRunner::new(dut_bus, MockTimer, node, &inbound, &outbound);

    host_bus.send(&frame(120, NERD, &[0x01, 0x2C])).await.unwrap();
    runner.tick().await.unwrap();
    assert!(!runner.node().has_paged_replies());
    assert_eq!(runner.node().counters().send_failures, 0);

    let mut indices = Vec::new();
    for _ in 0..24 {
        let reply = timeout(Duration::from_millis(200), host_bus.recv())
            .await
            .expect("missing ENRSP")
            .unwrap();
        assert_eq!(reply.opcode(), Some(ENRSP));
        indices.push(reply.data[7]);
    }
    assert_eq!(indices, (0..24).collect::<Vec<u8>>());
}
