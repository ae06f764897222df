//! Async driver for [`CbusNode`] on top of an interrupt-driven [`CanBus`].
//!
//! The engine itself is synchronous. The runner bridges it to async drivers:
//!
//! * frames received from the bus are pushed into the engine's inbound queue;
//! * the engine transmits into an outbound queue through [`QueuedTransport`];
//! * every [`NODE_TICK_INTERVAL_MS`] (or as soon as a frame arrives) the engine
//!   is ticked and the outbound queue is flushed to the bus;
//! * replies that did not fit the outbound queue are paged: the engine is
//!   ticked and flushed again until none are left.
//!
//! Both queues are provided by the firmware, usually as `static` items.

use core::fmt::Debug;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Instant;
use futures_util::{future::select, future::Either, pin_mut};

use crate::error::{QueueError, SupervisorError};
use crate::infra::queue::FrameQueue;
use crate::protocol::managment::node::{CbusNode, NodeHandler};
use crate::protocol::transport::can_frame::CbusFrame;
use crate::protocol::transport::traits::can_bus::CanBus;
use crate::protocol::transport::traits::can_transport::CanTransport;
use crate::protocol::transport::traits::cbus_timer::CbusTimer;
use crate::protocol::transport::traits::config_store::ConfigStore;
use crate::protocol::transport::NODE_TICK_INTERVAL_MS;

/// [`CanTransport`] that only queues outbound frames. Reception goes straight
/// into the engine's inbound queue, so it never reports frames available.
pub struct QueuedTransport<'a, M: RawMutex, const N: usize> {
    outbound: &'a FrameQueue<M, CbusFrame, N>,
}

impl<'a, M: RawMutex, const N: usize> QueuedTransport<'a, M, N> {
    pub fn new(outbound: &'a FrameQueue<M, CbusFrame, N>) -> Self {
        Self { outbound }
    }
}

impl<M: RawMutex, const N: usize> CanTransport for QueuedTransport<'_, M, N> {
    type Error = QueueError;

    fn available(&mut self) -> bool {
        false
    }

    fn get_next_message(&mut self) -> Option<CbusFrame> {
        None
    }

    fn send_message(&mut self, frame: &CbusFrame) -> Result<(), Self::Error> {
        self.outbound.enqueue(*frame).map_err(|_| QueueError::Full)
    }

    fn send_capacity(&self) -> Option<usize> {
        Some(N - self.outbound.len())
    }
}

/// Engine type driven by [`NodeRunner`].
pub type QueuedNode<'a, S, H, M, const Q: usize, const O: usize> =
    CbusNode<'a, QueuedTransport<'a, M, O>, S, H, M, Q>;

/// Runner pumping an async bus through a [`CbusNode`].
pub struct NodeRunner<'a, B, Tm, S, H, M, const Q: usize, const O: usize>
where
    B: CanBus,
    Tm: CbusTimer,
    S: ConfigStore,
    H: NodeHandler,
    M: RawMutex,
{
    bus: B,
    timer: Tm,
    node: QueuedNode<'a, S, H, M, Q, O>,
    inbound: &'a FrameQueue<M, CbusFrame, Q>,
    outbound: &'a FrameQueue<M, CbusFrame, O>,
}

impl<'a, B, Tm, S, H, M, const Q: usize, const O: usize> NodeRunner<'a, B, Tm, S, H, M, Q, O>
where
    B: CanBus,
    B::Error: Debug,
    Tm: CbusTimer,
    S: ConfigStore,
    H: NodeHandler,
    M: RawMutex,
{
    /// Wire an engine, built over `inbound` and a [`QueuedTransport`] on
    /// `outbound`, to its bus and timer.
    pub fn new(
        bus: B,
        timer: Tm,
        node: QueuedNode<'a, S, H, M, Q, O>,
        inbound: &'a FrameQueue<M, CbusFrame, Q>,
        outbound: &'a FrameQueue<M, CbusFrame, O>,
    ) -> Self {
        Self {
            bus,
            timer,
            node,
            inbound,
            outbound,
        }
    }

    pub fn node(&self) -> &QueuedNode<'a, S, H, M, Q, O> {
        &self.node
    }

    /// Operator access to the engine between ticks.
    pub fn node_mut(&mut self) -> &mut QueuedNode<'a, S, H, M, Q, O> {
        &mut self.node
    }

    /// Wait for a frame or the tick timer, run the engine once and flush
    /// whatever it queued for transmission.
    pub async fn tick(&mut self) -> Result<(), SupervisorError<B::Error>> {
        let mut received = None;
        {
            let recv_future = self.bus.recv();
            let tick_future = self.timer.delay_ms(NODE_TICK_INTERVAL_MS);
            pin_mut!(recv_future);
            pin_mut!(tick_future);

            match select(recv_future, tick_future).await {
                Either::Left((result, _)) => {
                    received = Some(result.map_err(SupervisorError::Receive)?);
                }
                Either::Right(((), _)) => {}
            }
        }

        if let Some(frame) = received {
            if self.inbound.enqueue(frame).is_err() {
                #[cfg(feature = "defmt")]
                defmt::warn!("Inbound queue full, frame dropped");
            }
        }

        self.node.process(Instant::now());
        self.flush().await?;

        // Replies paged across ticks go out as soon as the queue has room again.
        while self.node.has_paged_replies() {
            self.node.process(Instant::now());
            self.flush().await?;
        }
        Ok(())
    }

    /// Send every queued outbound frame.
    pub async fn flush(&mut self) -> Result<(), SupervisorError<B::Error>> {
        while let Some(frame) = self.outbound.dequeue() {
            self.bus
                .send(&frame)
                .await
                .map_err(SupervisorError::Send)?;
        }
        Ok(())
    }

    /// Run forever; returns only on a bus error.
    pub async fn drive(mut self) -> Result<(), SupervisorError<B::Error>> {
        loop {
            self.tick().await?;
        }
    }
}
