//! # Quickstart Example
//!
//! Minimal example demonstrating the basics of korri-cbus:
//! - Build and classify accessory-event frames
//! - Run a node engine against an in-memory transport
//! - Negotiate FLiM with a simulated configuration tool
//! - Teach an event and consume it
//!
//! This example uses `std` for a quick trial run.
//!
//! ```bash
//! cargo run --example quickstart
//! ```

use std::collections::VecDeque;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::Instant;
use korri_cbus::config::NodeConfig;
use korri_cbus::core::{NodeMode, Polarity};
use korri_cbus::infra::queue::FrameQueue;
use korri_cbus::infra::store::MemoryStore;
use korri_cbus::protocol::managment::node::{CbusNode, NodeHandler};
use korri_cbus::protocol::opcodes;
use korri_cbus::protocol::transport::can_frame::{CbusFrame, EventQuery};
use korri_cbus::protocol::transport::traits::can_transport::CanTransport;

/// Transport printing every frame the node transmits.
#[derive(Default)]
struct ConsoleTransport {
    rx: VecDeque<CbusFrame>,
}

impl CanTransport for ConsoleTransport {
    type Error = ();

    fn available(&mut self) -> bool {
        !self.rx.is_empty()
    }

    fn get_next_message(&mut self) -> Option<CbusFrame> {
        self.rx.pop_front()
    }

    fn send_message(&mut self, frame: &CbusFrame) -> Result<(), ()> {
        print!("   -> can_id={:<3} ", frame.can_id());
        for byte in frame.payload() {
            print!("{:02X} ", byte);
        }
        println!();
        Ok(())
    }
}

struct Console;

impl NodeHandler for Console {
    fn on_event(&mut self, index: u8, frame: &CbusFrame) {
        println!(
            "   event #{} received: {}",
            index,
            frame.as_short_code().unwrap_or_default()
        );
    }

    fn indicate_mode(&mut self, mode: NodeMode) {
        println!("   mode: {:?}", mode);
    }
}

fn main() {
    println!("=== korri-cbus Quickstart ===\n");

    // ======================================================================
    // 1. Accessory events
    // ======================================================================
    println!("1. Building an accessory event");

    let event = CbusFrame::from_event(Polarity::On, 22, 25);
    println!("   Opcode: {:#04X}", event.data[0]);
    println!("   Is event: {}", event.is_event());
    println!("   Tuple: {:?}", event.as_tuple());
    println!("   Short code: {}", event.as_short_code().unwrap_or_default());

    let query: EventQuery = "-N22E25".parse().unwrap_or(EventQuery::any(22, 25));
    println!("   Matches -N22E25: {}\n", query.matches(&event));

    // ======================================================================
    // 2. Start a node
    // ======================================================================
    println!("2. Starting a SLiM node");

    let inbound = FrameQueue::<NoopRawMutex, CbusFrame, 16>::new();
    let store = MemoryStore::new(16, 2, 8);
    let config = NodeConfig::default().with_name("DEMO");
    let mut node = CbusNode::new(ConsoleTransport::default(), store, Console, &inbound, config);
    if node.begin().is_err() {
        eprintln!("   transport failed to start");
        return;
    }

    // ======================================================================
    // 3. FLiM negotiation
    // ======================================================================
    println!("\n3. Requesting a node number");

    let tool = 120;
    let mut now = Instant::from_millis(0);
    node.request_flim(now).ok();
    node.transport_mut()
        .rx
        .push_back(CbusFrame::from_opcode(tool, opcodes::SNN, &[0x01, 0x00]));
    node.process(now);

    // Let the enumeration window close.
    now = Instant::from_millis(150);
    node.process(now);
    println!(
        "   node_number={}, can_id={}\n",
        node.state().node_number,
        node.state().can_id
    );

    // ======================================================================
    // 4. Teach and consume an event
    // ======================================================================
    println!("4. Teaching N22E25");

    let frames = [
        CbusFrame::from_opcode(tool, opcodes::NNLRN, &[0x01, 0x00]),
        CbusFrame::from_opcode(tool, opcodes::EVLRN, &[0, 22, 0, 25, 1, 1]),
        CbusFrame::from_opcode(tool, opcodes::NNULN, &[0x01, 0x00]),
        event,
    ];
    for frame in frames {
        node.transport_mut().rx.push_back(frame);
    }
    while node.process(now) > 0 {}

    println!(
        "\n   frames received={}, sent={}",
        node.counters().received,
        node.counters().sent
    );
}
