//! Identity state of a node (SLIM / CHANGING / FLIM) and its transitions.
//!
//! This module only mutates state; the node engine sends the matching
//! wire messages and persists the result.
use embassy_time::{Duration, Instant};

use crate::core::NodeMode;
use crate::protocol::managment::params::flags;
use crate::protocol::transport::traits::config_store::ConfigStore;

/// Frame counters kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeCounters {
    pub received: u32,
    pub sent: u32,
    /// Replies the transport refused during a tick.
    pub send_failures: u32,
}

/// Everything the engine knows about its own identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeState {
    pub mode: NodeMode,
    pub can_id: u8,
    pub node_number: u16,
    /// A SLIM/FLIM negotiation is open.
    pub in_transition: bool,
    /// Event teaching (`EVLRN`, `EVULN`, `NNCLR`) is allowed.
    pub learn_mode: bool,
    pub counters: NodeCounters,
    /// Mode restored when a transition times out.
    stable_mode: NodeMode,
    transition_started: Option<Instant>,
}

impl NodeState {
    /// Initial state from persisted configuration. A node that was switched off
    /// mid-negotiation comes back in its last stable mode.
    pub fn load<S: ConfigStore>(store: &S) -> Self {
        let mode = match store.mode() {
            NodeMode::Changing if store.node_number() != 0 => NodeMode::Flim,
            NodeMode::Changing => NodeMode::Slim,
            mode => mode,
        };
        Self {
            mode,
            can_id: store.can_id(),
            node_number: store.node_number(),
            in_transition: false,
            learn_mode: false,
            counters: NodeCounters::default(),
            stable_mode: mode,
            transition_started: None,
        }
    }

    /// Open a negotiation (operator request). Returns `false` if one is already open.
    pub fn begin_transition(&mut self, now: Instant) -> bool {
        if self.in_transition {
            return false;
        }
        self.stable_mode = self.mode;
        self.mode = NodeMode::Changing;
        self.in_transition = true;
        self.transition_started = Some(now);
        true
    }

    /// Accept the node number assigned by `SNN`. Returns `false` outside a negotiation.
    pub fn complete_transition(&mut self, node_number: u16) -> bool {
        if !self.in_transition {
            return false;
        }
        self.node_number = node_number;
        self.mode = NodeMode::Flim;
        self.stable_mode = NodeMode::Flim;
        self.in_transition = false;
        self.transition_started = None;
        true
    }

    /// Give up the node number and CAN-ID.
    pub fn revert_to_slim(&mut self) {
        self.mode = NodeMode::Slim;
        self.stable_mode = NodeMode::Slim;
        self.node_number = 0;
        self.can_id = 0;
        self.in_transition = false;
        self.learn_mode = false;
        self.transition_started = None;
    }

    /// `true` once an open negotiation has outlived `timeout`.
    pub fn transition_expired(&self, now: Instant, timeout: Duration) -> bool {
        match self.transition_started {
            Some(started) if self.in_transition => {
                now.saturating_duration_since(started) >= timeout
            }
            _ => false,
        }
    }

    /// Close a timed-out negotiation and return to the last stable mode.
    pub fn cancel_transition(&mut self) -> NodeMode {
        self.in_transition = false;
        self.transition_started = None;
        self.mode = self.stable_mode;
        self.mode
    }

    /// Live value of parameter 8.
    pub fn flags(&self, base: u8) -> u8 {
        let mut value = base & !(flags::FLIM | flags::LEARN);
        if self.mode == NodeMode::Flim {
            value |= flags::FLIM;
        }
        if self.learn_mode {
            value |= flags::LEARN;
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::store::MemoryStore;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn test_slim_to_flim() {
        let mut state = NodeState::load(&MemoryStore::new(1, 1, 1));
        assert_eq!(state.mode, NodeMode::Slim);
        assert!(!state.complete_transition(300));

        assert!(state.begin_transition(at(0)));
        assert_eq!(state.mode, NodeMode::Changing);
        assert!(!state.begin_transition(at(1)));

        assert!(state.complete_transition(300));
        assert_eq!(state.mode, NodeMode::Flim);
        assert_eq!(state.node_number, 300);
        assert!(!state.in_transition);
    }

    #[test]
    fn test_timeout_restores_stable_mode() {
        let store = MemoryStore::new(1, 1, 1).with_identity(NodeMode::Flim, 5, 77);
        let mut state = NodeState::load(&store);
        state.begin_transition(at(1_000));

        let timeout = Duration::from_secs(30);
        assert!(!state.transition_expired(at(30_999), timeout));
        assert!(state.transition_expired(at(31_000), timeout));
        assert_eq!(state.cancel_transition(), NodeMode::Flim);
        assert!(!state.transition_expired(at(90_000), timeout));
    }

    #[test]
    fn test_revert_clears_identity() {
        let store = MemoryStore::new(1, 1, 1).with_identity(NodeMode::Flim, 5, 77);
        let mut state = NodeState::load(&store);
        state.learn_mode = true;
        state.revert_to_slim();
        assert_eq!(state.mode, NodeMode::Slim);
        assert_eq!(state.can_id, 0);
        assert_eq!(state.node_number, 0);
        assert!(!state.learn_mode);
    }

    #[test]
    fn test_interrupted_negotiation_reloads_stable_mode() {
        let store = MemoryStore::new(1, 1, 1).with_identity(NodeMode::Changing, 3, 0);
        assert_eq!(NodeState::load(&store).mode, NodeMode::Slim);
    }

    #[test]
    fn test_flags_follow_mode() {
        let store = MemoryStore::new(1, 1, 1).with_identity(NodeMode::Flim, 5, 77);
        let mut state = NodeState::load(&store);
        assert_eq!(state.flags(flags::CONSUMER), flags::CONSUMER | flags::FLIM);
        state.learn_mode = true;
        assert_eq!(
            state.flags(flags::CONSUMER),
            flags::CONSUMER | flags::FLIM | flags::LEARN
        );
    }
}
