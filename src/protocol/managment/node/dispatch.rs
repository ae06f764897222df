//! Opcode dispatch: one arm per handled opcode, replies built in place.
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Instant;

use super::{CbusNode, NodeHandler};
use crate::core::{NodeMode, MAX_CAN_ID, MIN_CAN_ID};
use crate::protocol::managment::params::NodeParams;
use crate::protocol::opcodes::{self, cmderr};
use crate::protocol::transport::can_frame::CbusFrame;
use crate::protocol::transport::traits::config_store::{record_key, EVENT_KEY_LEN};
use crate::protocol::transport::traits::{can_transport::CanTransport, config_store::ConfigStore};

impl<'a, T, S, H, M, const Q: usize> CbusNode<'a, T, S, H, M, Q>
where
    T: CanTransport,
    S: ConfigStore,
    H: NodeHandler,
    M: RawMutex,
{
    /// Route a non-empty standard frame to its handler.
    pub(super) fn dispatch(&mut self, frame: &CbusFrame, now: Instant) {
        let Some(opcode) = frame.opcode() else {
            return;
        };
        if opcodes::is_event_opcode(opcode) {
            self.handle_accessory_event(opcode, frame);
            return;
        }

        match opcode {
            // Broadcast queries
            opcodes::QNN => self.handle_qnn(),
            opcodes::RQNP => self.handle_rqnp(),
            opcodes::RQMN => self.handle_rqmn(),
            // Identity
            opcodes::SNN => self.handle_snn(frame, now),
            opcodes::CANID => self.handle_canid(frame),
            opcodes::ENUM => self.handle_enum(frame, now),
            // Learned events, learn mode
            opcodes::EVLRN => self.handle_evlrn(frame),
            opcodes::EVULN => self.handle_evuln(frame),
            opcodes::DTXC => self.handle_dtxc(frame, now),
            _ if self.addressed_to_us(frame) => self.dispatch_addressed(opcode, frame),
            _ => {}
        }
    }

    /// Opcodes that carry the target node number in bytes 1 and 2.
    fn dispatch_addressed(&mut self, opcode: u8, frame: &CbusFrame) {
        match opcode {
            opcodes::RQNPN => self.handle_rqnpn(frame),
            opcodes::NVRD => self.handle_nvrd(frame),
            opcodes::NVSET => self.handle_nvset(frame),
            opcodes::NNLRN => self.state.learn_mode = true,
            opcodes::NNULN => self.state.learn_mode = false,
            opcodes::NNCLR => self.handle_nnclr(),
            opcodes::RQEVN => self.handle_rqevn(),
            opcodes::NNEVN => self.handle_nnevn(),
            opcodes::NERD => self.handle_nerd(),
            opcodes::REVAL => self.handle_reval(frame),
            _ => {
                #[cfg(feature = "defmt")]
                defmt::debug!("Unhandled opcode {=u8:#X}", opcode);
            }
        }
    }

    fn addressed_to_us(&self, frame: &CbusFrame) -> bool {
        frame.len >= 3 && frame.node_number() == self.state.node_number
    }

    /// Configured parameters with the event and NV table sizes of the store.
    fn live_params(&self) -> NodeParams {
        self.config.params.with_store_sizes(
            self.store.event_slots(),
            self.store.evs_per_event(),
            self.store.nv_count(),
        )
    }

    fn live_flags(&self) -> u8 {
        let mut flags = self.state.flags(self.config.params.flags);
        if self.config.consume_own_messages {
            flags |= crate::protocol::managment::params::flags::CONSUME_OWN_EVENTS;
        }
        flags
    }

    //==================================================================================EVENTS
    fn handle_accessory_event(&mut self, opcode: u8, frame: &CbusFrame) {
        let (node_number, event_number) = frame.node_and_event_numbers();
        // Short events are learned device numbers, independent of the sender.
        let node_number = if opcodes::is_short_event_opcode(opcode) {
            0
        } else {
            node_number
        };
        if let Some(index) = self.store.find_existing_event(node_number, event_number) {
            self.handler.on_event(index, frame);
        }
    }

    fn handle_evlrn(&mut self, frame: &CbusFrame) {
        if !self.state.learn_mode {
            return;
        }
        let (node_number, event_number) = frame.node_and_event_numbers();
        let ev_index = frame.data[5];
        let value = frame.data[6];
        if ev_index == 0 || ev_index > self.store.evs_per_event() {
            self.command_error(cmderr::INVALID_EVENT);
            return;
        }
        if self
            .store
            .write_event(node_number, event_number, ev_index, value)
        {
            self.acknowledge();
        } else {
            #[cfg(feature = "defmt")]
            defmt::warn!("Event table full, N{}E{} not learned", node_number, event_number);
            self.command_error(cmderr::INVALID_NV_OR_WRITE);
        }
    }

    fn handle_evuln(&mut self, frame: &CbusFrame) {
        if !self.state.learn_mode {
            return;
        }
        let (node_number, event_number) = frame.node_and_event_numbers();
        if self.store.clear_event(node_number, event_number) {
            self.acknowledge();
        } else {
            self.command_error(cmderr::INVALID_NV_OR_WRITE);
        }
    }

    fn handle_nnclr(&mut self) {
        if !self.state.learn_mode {
            self.command_error(cmderr::NOT_LEARN_MODE);
            return;
        }
        self.store.clear_all_events();
        self.acknowledge();
    }

    fn handle_rqevn(&mut self) {
        let [nh, nl] = self.nn_bytes();
        let count = self.store.count_events().min(u8::MAX as u32) as u8;
        self.reply(opcodes::NUMEV, &[nh, nl, count]);
    }

    fn handle_nnevn(&mut self) {
        let [nh, nl] = self.nn_bytes();
        let used = self.store.count_events().min(u8::MAX as u32) as u8;
        let free = self.store.event_slots().saturating_sub(used);
        self.reply(opcodes::EVNLF, &[nh, nl, free]);
    }

    /// A new `NERD` restarts the listing from the first record.
    fn handle_nerd(&mut self) {
        self.nerd_cursor = Some(0);
        self.service_nerd();
    }

    /// Emit `ENRSP` replies while the transport has room, resuming where the
    /// previous tick stopped.
    pub(super) fn service_nerd(&mut self) {
        let Some(start) = self.nerd_cursor else {
            return;
        };
        let [nh, nl] = self.nn_bytes();
        for index in start..self.store.event_slots() {
            let Some((node_number, event_number)) =
                self.store.read_event(index).as_deref().and_then(record_key)
            else {
                continue;
            };
            if self.transport.send_capacity() == Some(0) {
                #[cfg(feature = "defmt")]
                defmt::debug!("NERD paused at record {}", index);
                self.nerd_cursor = Some(index);
                return;
            }
            let [eh, el] = node_number.to_be_bytes();
            let [vh, vl] = event_number.to_be_bytes();
            self.reply(opcodes::ENRSP, &[nh, nl, eh, el, vh, vl, index]);
        }
        self.nerd_cursor = None;
    }

    fn handle_reval(&mut self, frame: &CbusFrame) {
        let event_index = frame.data[3];
        let ev_index = frame.data[4];
        let value = self.store.read_event(event_index).and_then(|record| {
            record_key(&record)?;
            if ev_index == 0 {
                return None;
            }
            record.get(EVENT_KEY_LEN + ev_index as usize - 1).copied()
        });
        match value {
            Some(value) => {
                let [nh, nl] = self.nn_bytes();
                self.reply(opcodes::NEVAL, &[nh, nl, event_index, ev_index, value]);
            }
            None => self.command_error(cmderr::INVALID_EVENT),
        }
    }

    //==================================================================================VARIABLES
    fn handle_nvrd(&mut self, frame: &CbusFrame) {
        let index = frame.data[3];
        if index == 0 || index > self.store.nv_count() {
            self.command_error(cmderr::INVALID_NV_OR_WRITE);
            return;
        }
        let [nh, nl] = self.nn_bytes();
        let value = self.store.read_nv(index);
        self.reply(opcodes::NVANS, &[nh, nl, index, value]);
    }

    fn handle_nvset(&mut self, frame: &CbusFrame) {
        let index = frame.data[3];
        if index == 0 || index > self.store.nv_count() {
            self.command_error(cmderr::INVALID_NV_OR_WRITE);
            return;
        }
        self.store.write_nv(index, frame.data[4]);
        self.acknowledge();
    }

    //==================================================================================PARAMETERS
    fn handle_qnn(&mut self) {
        if self.state.node_number == 0 {
            return;
        }
        let [nh, nl] = self.nn_bytes();
        let params = self.config.params;
        let flags = self.live_flags();
        self.reply(
            opcodes::PNN,
            &[nh, nl, params.manufacturer, params.module_id, flags],
        );
    }

    fn handle_rqnp(&mut self) {
        if !self.state.in_transition {
            return;
        }
        let summary = self.live_params().summary();
        self.reply(opcodes::PARAMS, &summary);
    }

    fn handle_rqmn(&mut self) {
        if !self.state.in_transition {
            return;
        }
        let name = self.config.name;
        self.reply(opcodes::NAME, &name);
    }

    fn handle_rqnpn(&mut self, frame: &CbusFrame) {
        let index = frame.data[3];
        match self.live_params().get(index, self.live_flags()) {
            Some(value) => {
                let [nh, nl] = self.nn_bytes();
                self.reply(opcodes::PARAN, &[nh, nl, index, value]);
            }
            None => self.command_error(cmderr::INVALID_PARAM_INDEX),
        }
    }

    //==================================================================================IDENTITY
    fn handle_snn(&mut self, frame: &CbusFrame, now: Instant) {
        if !self.state.in_transition {
            return;
        }
        let node_number = frame.node_number();
        self.state.complete_transition(node_number);
        self.store.set_node_number(node_number);
        self.store.set_mode(NodeMode::Flim);
        #[cfg(feature = "defmt")]
        defmt::info!("Node number {} assigned, FLiM", node_number);

        let nn = self.nn_bytes();
        self.reply(opcodes::NNACK, &nn);
        self.handler.indicate_mode(NodeMode::Flim);
        self.start_enumeration(now);
    }

    fn handle_canid(&mut self, frame: &CbusFrame) {
        if !self.addressed_to_us(frame) {
            return;
        }
        let can_id = frame.data[3];
        if !(MIN_CAN_ID..=MAX_CAN_ID).contains(&can_id) {
            self.command_error(cmderr::INVALID_CAN_ID);
            return;
        }
        self.state.can_id = can_id;
        self.store.set_can_id(can_id);
        self.acknowledge();
    }

    fn handle_enum(&mut self, frame: &CbusFrame, now: Instant) {
        if self.addressed_to_us(frame) {
            self.start_enumeration(now);
        }
    }

    //==================================================================================LONG_MESSAGE
    fn handle_dtxc(&mut self, frame: &CbusFrame, now: Instant) {
        if let Some(message) = self.long.process_frame(frame, now) {
            self.handler.on_long_message(&message);
        }
    }

    fn acknowledge(&mut self) {
        let nn = self.nn_bytes();
        self.reply(opcodes::WRACK, &nn);
    }
}
