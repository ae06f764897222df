//! Event history tests: retention, overflow and temporal queries.
use super::*;
use crate::core::Polarity;
use crate::protocol::transport::can_frame::FrameFilter;

fn at(ms: u64) -> Instant {
    Instant::from_millis(ms)
}

fn on(node: u16, event: u16) -> CbusFrame {
    CbusFrame::from_event(Polarity::On, node, event)
}

fn off(node: u16, event: u16) -> CbusFrame {
    CbusFrame::from_event(Polarity::Off, node, event)
}

fn three_events() -> EventHistory {
    let mut history = EventHistory::default();
    history.add(&on(1, 1), at(100));
    history.add(&on(1, 2), at(200));
    history.add(&on(1, 3), at(300));
    history
}

#[test]
/// Events at t1 < t2 < t3 are in given order and not in reverse order.
fn test_sequence_order() {
    let history = three_events();
    let events = [EventQuery::on(1, 1), EventQuery::on(1, 2), EventQuery::on(1, 3)];
    let now = at(400);

    assert!(history.sequence_received(&events, SequenceOrder::Given, None, None, now));
    assert!(!history.sequence_received(&events, SequenceOrder::Reverse, None, None, now));
    assert!(history.sequence_received(&events, SequenceOrder::Any, None, None, now));

    let reversed = [EventQuery::on(1, 3), EventQuery::on(1, 2), EventQuery::on(1, 1)];
    assert!(history.sequence_received(&reversed, SequenceOrder::Reverse, None, None, now));
    assert!(history.received_in_order(&events));
    assert!(!history.received_in_order(&reversed));
}

#[test]
fn test_sequence_window_and_timespan() {
    let history = three_events();
    let events = [EventQuery::on(1, 1), EventQuery::on(1, 3)];
    let now = at(400);

    // Trailing window of 250 ms excludes the first event.
    assert!(!history.sequence_received(
        &events,
        SequenceOrder::Given,
        Some(Duration::from_millis(250)),
        None,
        now
    ));
    assert!(history.sequence_received(
        &events,
        SequenceOrder::Given,
        Some(Duration::from_millis(300)),
        Some(Duration::from_millis(200)),
        now
    ));
    assert!(!history.sequence_received(
        &events,
        SequenceOrder::Given,
        None,
        Some(Duration::from_millis(199)),
        now
    ));
}

#[test]
fn test_missing_event_fails_sequence() {
    let history = three_events();
    let events = [EventQuery::on(1, 1), EventQuery::on(9, 9)];
    assert!(!history.sequence_received(&events, SequenceOrder::Any, None, None, at(400)));
}

#[test]
fn test_polarity_matching_and_counts() {
    let mut history = EventHistory::default();
    history.add(&on(5, 5), at(10));
    history.add(&off(5, 5), at(20));
    history.add(&on(5, 5), at(30));

    let now = at(40);
    assert_eq!(history.count_of_event(&EventQuery::any(5, 5), None, now), 3);
    assert_eq!(history.count_of_event(&EventQuery::on(5, 5), None, now), 2);
    assert_eq!(
        history.count_of_event(&EventQuery::off(5, 5), Some(Duration::from_millis(15)), now),
        0
    );
    assert!(history.event_received(&EventQuery::off(5, 5), None, now));

    assert_eq!(
        history.time_received(&EventQuery::on(5, 5), Receipt::Earliest),
        Some(at(10))
    );
    assert_eq!(
        history.time_received(&EventQuery::on(5, 5), Receipt::Latest),
        Some(at(30))
    );
    assert_eq!(
        history.time_received(&EventQuery::any(5, 5), Receipt::Any),
        Some(at(10))
    );
    assert_eq!(history.time_received(&EventQuery::any(6, 5), Receipt::Any), None);
}

#[test]
fn test_before_and_after() {
    let history = three_events();
    let first = EventQuery::on(1, 1);
    let third = EventQuery::on(1, 3);
    assert!(history.received_before(&first, &third));
    assert!(!history.received_before(&third, &first));
    assert!(history.received_after(&third, &first));
    assert!(!history.received_before(&first, &EventQuery::on(7, 7)));
}

#[test]
/// Once full, new entries are dropped and old ones kept.
fn test_drop_newest_on_overflow() {
    let mut history = EventHistory::new(HistoryConfig::default().with_capacity(2));
    assert!(history.add(&on(1, 1), at(1)));
    assert!(history.add(&on(1, 2), at(2)));
    assert!(!history.add(&on(1, 3), at(3)));
    assert_eq!(history.len(), 2);
    assert!(!history.event_received(&EventQuery::on(1, 3), None, at(4)));
}

#[test]
fn test_evict_oldest_on_overflow() {
    let config = HistoryConfig::default()
        .with_capacity(2)
        .with_overflow(OverflowPolicy::EvictOldest);
    let mut history = EventHistory::new(config);
    history.add(&on(1, 1), at(1));
    history.add(&on(1, 2), at(2));
    assert!(history.add(&on(1, 3), at(3)));
    assert!(!history.event_received(&EventQuery::on(1, 1), None, at(4)));
    assert!(history.event_received(&EventQuery::on(1, 3), None, at(4)));
}

#[test]
fn test_reaper_expires_by_ttl() {
    let mut history = EventHistory::new(HistoryConfig::default().with_ttl(Duration::from_millis(1000)));
    history.add(&on(1, 1), at(0));
    history.add(&on(1, 2), at(500));

    assert_eq!(history.reap(at(1000)), 0);
    assert_eq!(history.reap(at(1001)), 1);
    assert_eq!(history.len(), 1);
    assert_eq!(history.reap(at(2000)), 1);
    assert!(history.is_empty());
}

#[test]
fn test_event_filter() {
    let mut history = EventHistory::new(HistoryConfig::default().with_filter(FrameFilter::Events));
    let qnn = CbusFrame::with_opcode(crate::protocol::opcodes::QNN, &[]);
    assert!(!history.add(&qnn, at(0)));
    assert!(history.add(&on(1, 1), at(0)));
    assert_eq!(history.len(), 1);
}
