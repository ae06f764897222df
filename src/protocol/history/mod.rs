//! Event history: a capacity- and time-bounded log of observed frames with
//! temporal queries over accessory events.
//!
//! Sequencing logic (routes, interlocks, "A then B within 2 s" rules) asks the
//! log questions instead of keeping its own timers. Entries older than the
//! configured TTL are removed by [`EventHistory::reap`], which the owner calls
//! periodically.
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use embassy_time::{Duration, Instant};

use crate::config::{HistoryConfig, OverflowPolicy};
use crate::protocol::transport::can_frame::{CbusFrame, EventQuery};

/// One logged frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryItem {
    pub frame: CbusFrame,
    pub inserted_at: Instant,
}

/// Which receipt time to report when an event was seen several times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Receipt {
    Earliest,
    Latest,
    /// First match found; with in-order insertion this is the earliest one.
    #[default]
    Any,
}

/// Ordering constraint applied by [`EventHistory::sequence_received`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequenceOrder {
    #[default]
    Any,
    /// Receipt times strictly follow the list order.
    Given,
    /// Receipt times strictly follow the reversed list order.
    Reverse,
}

/// Bounded frame log.
#[derive(Debug, Clone)]
pub struct EventHistory {
    items: VecDeque<HistoryItem>,
    config: HistoryConfig,
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl EventHistory {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            items: VecDeque::with_capacity(config.capacity),
            config,
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    //==================================================================================MAINTENANCE
    /// Log `frame` if it passes the filter. Returns `false` when it was not stored.
    pub fn add(&mut self, frame: &CbusFrame, now: Instant) -> bool {
        if !self.config.filter.matches(frame) || self.config.capacity == 0 {
            return false;
        }
        if self.items.len() >= self.config.capacity {
            match self.config.overflow {
                OverflowPolicy::DropNewest => {
                    #[cfg(feature = "defmt")]
                    defmt::debug!("History full, frame dropped");
                    return false;
                }
                OverflowPolicy::EvictOldest => {
                    self.items.pop_front();
                }
            }
        }
        self.items.push_back(HistoryItem {
            frame: *frame,
            inserted_at: now,
        });
        true
    }

    /// Delete entries whose TTL has expired. Returns the number removed.
    pub fn reap(&mut self, now: Instant) -> usize {
        let ttl = self.config.ttl;
        let before = self.items.len();
        self.items
            .retain(|item| now.saturating_duration_since(item.inserted_at) <= ttl);
        before - self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryItem> {
        self.items.iter()
    }

    //==================================================================================QUERIES
    fn matching<'a>(
        &'a self,
        query: &'a EventQuery,
        within: Option<Duration>,
        now: Instant,
    ) -> impl Iterator<Item = &'a HistoryItem> + 'a {
        self.items.iter().filter(move |item| {
            query.matches(&item.frame)
                && within.is_none_or(|window| {
                    now.saturating_duration_since(item.inserted_at) <= window
                })
        })
    }

    /// `true` when a matching event was logged, optionally within a trailing window.
    pub fn event_received(
        &self,
        query: &EventQuery,
        within: Option<Duration>,
        now: Instant,
    ) -> bool {
        self.matching(query, within, now).next().is_some()
    }

    /// Number of logged occurrences of the event.
    pub fn count_of_event(
        &self,
        query: &EventQuery,
        within: Option<Duration>,
        now: Instant,
    ) -> usize {
        self.matching(query, within, now).count()
    }

    /// Receipt time of the event, selected by `which`.
    pub fn time_received(&self, query: &EventQuery, which: Receipt) -> Option<Instant> {
        self.time_received_within(query, which, None, Instant::MAX)
    }

    fn time_received_within(
        &self,
        query: &EventQuery,
        which: Receipt,
        within: Option<Duration>,
        now: Instant,
    ) -> Option<Instant> {
        let mut times = self.matching(query, within, now).map(|item| item.inserted_at);
        match which {
            Receipt::Any => times.next(),
            Receipt::Earliest => times.min(),
            Receipt::Latest => times.max(),
        }
    }

    /// `true` when both events were received and `first` (earliest receipt) came strictly first.
    pub fn received_before(&self, first: &EventQuery, second: &EventQuery) -> bool {
        match (
            self.time_received(first, Receipt::Earliest),
            self.time_received(second, Receipt::Earliest),
        ) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }

    /// `true` when both events were received and `first` came strictly after `second`.
    pub fn received_after(&self, first: &EventQuery, second: &EventQuery) -> bool {
        self.received_before(second, first)
    }

    /// `true` when every event was received, in list order.
    pub fn received_in_order(&self, events: &[EventQuery]) -> bool {
        self.sequence_received(events, SequenceOrder::Given, None, None, Instant::MAX)
    }

    /// `true` when every event in `events` was received (within the trailing
    /// window when given), their receipt times satisfy `order`, and the spread
    /// between the first and last receipt does not exceed `timespan`.
    pub fn sequence_received(
        &self,
        events: &[EventQuery],
        order: SequenceOrder,
        within: Option<Duration>,
        timespan: Option<Duration>,
        now: Instant,
    ) -> bool {
        let mut times = Vec::with_capacity(events.len());
        for query in events {
            match self.time_received_within(query, Receipt::Earliest, within, now) {
                Some(time) => times.push(time),
                None => return false,
            }
        }

        let ordered = match order {
            SequenceOrder::Any => true,
            SequenceOrder::Given => times.windows(2).all(|w| w[0] < w[1]),
            SequenceOrder::Reverse => times.windows(2).all(|w| w[0] > w[1]),
        };
        if !ordered {
            return false;
        }

        match (timespan, times.iter().min(), times.iter().max()) {
            (Some(limit), Some(first), Some(last)) => *last - *first <= limit,
            _ => true,
        }
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
