//! Opcode dispatch: learned events, event teaching, node variables,
//! parameters and identity commands.
mod helpers;

use helpers::{at, deliver, flim_node, frame, node_with, Queue, NN};
use korri_cbus::config::NodeConfig;
use korri_cbus::core::NodeMode;
use korri_cbus::infra::store::MemoryStore;
use korri_cbus::protocol::opcodes::*;
use korri_cbus::protocol::transport::can_frame::{CbusFrame, EventQuery, FrameFilter};
use korri_cbus::protocol::transport::traits::config_store::ConfigStore;

const TOOL: u8 = 120;
const NH: u8 = (NN >> 8) as u8;
const NL: u8 = NN as u8;

fn learn_on() -> CbusFrame {
    frame(TOOL, NNLRN, &[NH, NL])
}

fn teach(node: u16, event: u16, ev_index: u8, value: u8) -> CbusFrame {
    let [nh, nl] = node.to_be_bytes();
    let [eh, el] = event.to_be_bytes();
    frame(TOOL, EVLRN, &[nh, nl, eh, el, ev_index, value])
}

#[test]
/// A taught event triggers the event callback with its record index.
fn test_learn_then_consume_event() {
    let queue = Queue::new();
    let mut node = flim_node(&queue);

    let sent = deliver(&mut node, &queue, &[learn_on(), teach(22, 25, 1, 7)], at(0));
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload(), [WRACK, NH, NL]);
    assert!(node.state().learn_mode);

    let sent = deliver(
        &mut node,
        &queue,
        &[
            frame(TOOL, NNULN, &[NH, NL]),
            frame(9, ACON, &[0, 22, 0, 25]),
            frame(9, ACOF1, &[0, 22, 0, 25, 0xAA]),
            frame(9, ACON, &[0, 22, 0, 26]),
        ],
        at(10),
    );
    assert!(sent.is_empty());
    assert!(!node.state().learn_mode);

    let events = &node.handler().events;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].0, 0);
    assert_eq!(events[0].1.as_tuple(), (1, 22, 25));
    assert_eq!(events[1].1.as_tuple(), (0, 22, 25));
    assert_eq!(events[1].1.event_data(), [0xAA]);

    assert!(node
        .history()
        .event_received(&EventQuery::on(22, 25), None, at(10)));
    assert_eq!(
        node.history()
            .count_of_event(&EventQuery::any(22, 25), None, at(10)),
        2
    );
}

#[test]
/// Short events match on the device number alone.
fn test_short_event_lookup() {
    let queue = Queue::new();
    let mut node = flim_node(&queue);
    deliver(&mut node, &queue, &[learn_on(), teach(0, 7, 1, 1)], at(0));
    deliver(&mut node, &queue, &[frame(9, ASON, &[0, 55, 0, 7])], at(1));
    assert_eq!(node.handler().events.len(), 1);
}

#[test]
/// Teaching is silent outside learn mode and rejects bad EV indices.
fn test_teach_guards() {
    let queue = Queue::new();
    let mut node = flim_node(&queue);

    let sent = deliver(&mut node, &queue, &[teach(22, 25, 1, 7)], at(0));
    assert!(sent.is_empty());
    assert_eq!(node.store().count_events(), 0);

    let sent = deliver(&mut node, &queue, &[learn_on(), teach(22, 25, 3, 7)], at(1));
    assert_eq!(sent[0].payload(), [CMDERR, NH, NL, 6]);
    assert_eq!(node.store().count_events(), 0);
}

#[test]
/// A full event table answers CMDERR 10.
fn test_event_table_full() {
    let queue = Queue::new();
    let store = MemoryStore::new(1, 2, 0).with_identity(NodeMode::Flim, 5, NN);
    let mut node = node_with(&queue, store, NodeConfig::default());
    let sent = deliver(
        &mut node,
        &queue,
        &[learn_on(), teach(1, 1, 1, 1), teach(1, 2, 1, 1)],
        at(0),
    );
    assert_eq!(sent[0].payload(), [WRACK, NH, NL]);
    assert_eq!(sent[1].payload(), [CMDERR, NH, NL, 10]);
}

#[test]
fn test_unlearn_and_clear() {
    let queue = Queue::new();
    let mut node = flim_node(&queue);

    // Clearing needs learn mode.
    let sent = deliver(&mut node, &queue, &[frame(TOOL, NNCLR, &[NH, NL])], at(0));
    assert_eq!(sent[0].payload(), [CMDERR, NH, NL, 2]);

    let sent = deliver(
        &mut node,
        &queue,
        &[
            learn_on(),
            teach(22, 25, 1, 1),
            teach(22, 26, 1, 1),
            frame(TOOL, EVULN, &[0, 22, 0, 25]),
            frame(TOOL, EVULN, &[0, 22, 0, 25]),
        ],
        at(1),
    );
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[2].payload(), [WRACK, NH, NL]);
    assert_eq!(sent[3].payload(), [CMDERR, NH, NL, 10]);
    assert_eq!(node.store().count_events(), 1);

    let sent = deliver(&mut node, &queue, &[frame(TOOL, NNCLR, &[NH, NL])], at(2));
    assert_eq!(sent[0].payload(), [WRACK, NH, NL]);
    assert_eq!(node.store().count_events(), 0);
}

#[test]
/// Event counts, free slots, the event dump and EV reads.
fn test_event_table_queries() {
    let queue = Queue::new();
    let mut node = flim_node(&queue);
    deliver(
        &mut node,
        &queue,
        &[learn_on(), teach(22, 25, 1, 7), teach(22, 26, 2, 9)],
        at(0),
    );

    let sent = deliver(
        &mut node,
        &queue,
        &[
            frame(TOOL, RQEVN, &[NH, NL]),
            frame(TOOL, NNEVN, &[NH, NL]),
            frame(TOOL, NERD, &[NH, NL]),
        ],
        at(1),
    );
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[0].payload(), [NUMEV, NH, NL, 2]);
    assert_eq!(sent[1].payload(), [EVNLF, NH, NL, 6]);
    assert_eq!(sent[2].payload(), [ENRSP, NH, NL, 0, 22, 0, 25, 0]);
    assert_eq!(sent[3].payload(), [ENRSP, NH, NL, 0, 22, 0, 26, 1]);

    let sent = deliver(
        &mut node,
        &queue,
        &[
            frame(TOOL, REVAL, &[NH, NL, 0, 1]),
            frame(TOOL, REVAL, &[NH, NL, 1, 2]),
            frame(TOOL, REVAL, &[NH, NL, 1, 0]),
            frame(TOOL, REVAL, &[NH, NL, 5, 1]),
        ],
        at(2),
    );
    assert_eq!(sent[0].payload(), [NEVAL, NH, NL, 0, 1, 7]);
    assert_eq!(sent[1].payload(), [NEVAL, NH, NL, 1, 2, 9]);
    assert_eq!(sent[2].payload(), [CMDERR, NH, NL, 6]);
    assert_eq!(sent[3].payload(), [CMDERR, NH, NL, 6]);
}

#[test]
fn test_node_variables() {
    let queue = Queue::new();
    let mut node = flim_node(&queue);
    let sent = deliver(
        &mut node,
        &queue,
        &[
            frame(TOOL, NVSET, &[NH, NL, 2, 99]),
            frame(TOOL, NVRD, &[NH, NL, 2]),
            frame(TOOL, NVRD, &[NH, NL, 5]),
            frame(TOOL, NVSET, &[NH, NL, 0, 1]),
        ],
        at(0),
    );
    assert_eq!(sent[0].payload(), [WRACK, NH, NL]);
    assert_eq!(sent[1].payload(), [NVANS, NH, NL, 2, 99]);
    assert_eq!(sent[2].payload(), [CMDERR, NH, NL, 10]);
    assert_eq!(sent[3].payload(), [CMDERR, NH, NL, 10]);
    assert_eq!(node.store().read_nv(2), 99);
}

#[test]
/// Parameter reads reflect the live FLiM and learn bits.
fn test_parameters() {
    let queue = Queue::new();
    let mut node = flim_node(&queue);
    let sent = deliver(
        &mut node,
        &queue,
        &[
            frame(TOOL, RQNPN, &[NH, NL, 0]),
            frame(TOOL, RQNPN, &[NH, NL, 8]),
            frame(TOOL, RQNPN, &[NH, NL, 21]),
            learn_on(),
            frame(TOOL, RQNPN, &[NH, NL, 8]),
            frame(TOOL, RQNPN, &[NH, NL, 4]),
            frame(TOOL, RQNPN, &[NH, NL, 5]),
            frame(TOOL, RQNPN, &[NH, NL, 6]),
        ],
        at(0),
    );
    assert_eq!(sent[0].payload(), [PARAN, NH, NL, 0, 20]);
    assert_eq!(sent[1].payload(), [PARAN, NH, NL, 8, 0x07]);
    assert_eq!(sent[2].payload(), [CMDERR, NH, NL, 9]);
    assert_eq!(sent[3].payload(), [PARAN, NH, NL, 8, 0x27]);
    // Table sizes come from the store: 8 events, 2 EVs each, 4 NVs.
    assert_eq!(sent[4].payload(), [PARAN, NH, NL, 4, 8]);
    assert_eq!(sent[5].payload(), [PARAN, NH, NL, 5, 2]);
    assert_eq!(sent[6].payload(), [PARAN, NH, NL, 6, 4]);
}

#[test]
fn test_query_node() {
    let queue = Queue::new();
    let mut node = flim_node(&queue);
    let sent = deliver(&mut node, &queue, &[frame(TOOL, QNN, &[])], at(0));
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload(), [PNN, NH, NL, 165, 0xFF, 0x07]);
    assert_eq!(sent[0].can_id(), 5);
}

#[test]
fn test_canid_assignment() {
    let queue = Queue::new();
    let mut node = flim_node(&queue);
    let sent = deliver(
        &mut node,
        &queue,
        &[
            frame(TOOL, CANID, &[NH, NL, 100]),
            frame(TOOL, CANID, &[NH, NL, 42]),
        ],
        at(0),
    );
    assert_eq!(sent[0].payload(), [CMDERR, NH, NL, 7]);
    assert_eq!(sent[1].payload(), [WRACK, NH, NL]);
    assert_eq!(sent[1].can_id(), 42);
    assert_eq!(node.state().can_id, 42);
    assert_eq!(node.store().can_id(), 42);
}

#[test]
/// Commands for other node numbers and unknown opcodes change nothing.
fn test_foreign_and_unknown_opcodes_ignored() {
    let queue = Queue::new();
    let mut node = flim_node(&queue);
    let sent = deliver(
        &mut node,
        &queue,
        &[
            frame(TOOL, NVRD, &[0, 9, 1]),
            frame(TOOL, NNLRN, &[0, 9]),
            frame(TOOL, CANID, &[0, 9, 42]),
            frame(TOOL, 0x0A, &[]),
            frame(TOOL, 0xC1, &[NH, NL, 1, 2, 3]),
        ],
        at(0),
    );
    assert!(sent.is_empty());
    assert!(!node.state().learn_mode);
    assert_eq!(node.state().can_id, 5);
    assert_eq!(node.counters().received, 5);
}

#[test]
/// The frame observer only sees frames accepted by the configured filter.
fn test_frame_filter() {
    let queue = Queue::new();
    let store = MemoryStore::new(8, 2, 4).with_identity(NodeMode::Flim, 5, NN);
    let config = NodeConfig::default().with_frame_filter(FrameFilter::Events);
    let mut node = node_with(&queue, store, config);
    deliver(
        &mut node,
        &queue,
        &[frame(TOOL, QNN, &[]), frame(9, ASOF, &[0, 0, 0, 3])],
        at(0),
    );
    assert_eq!(node.handler().frames.len(), 1);
    assert_eq!(node.handler().frames[0].opcode(), Some(ASOF));
}
