//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use rofinet_fdp::engine::UpdateProtocol;
use rofinet_fdp::error::Error as FdpError;
use rofinet_fdp::packet::Message;
use rofinet_fdp::update::Firmware;
use rofinet_rrp::instance::Instance;
use rofinet_rrp::interface::default_address;
use rofinet_rrp::output::strip_ipv6;
use rofinet_rrp::packet::{RRP_MULTICAST_GROUP, ipv6_destination};
use rofinet_utils::link::{
    CONTENT_TYPE_FDP, CONTENT_TYPE_IP, ConnectorId, LinkEvent, LinkFrame,
    LinkSendError, LinkTx, PhysAddr,
};
use rofinet_utils::partition::{Partition, UpdatePartition};
use rofinet_utils::queue::BoundedQueue;
use rofinet_utils::southbound::RouteTablePort;
use rofinet_utils::{Receiver, UnboundedReceiver, UnboundedSender};
use tokio::sync::mpsc;
use tracing::warn;

use crate::tasks;
use crate::tasks::messages::input::{AnnounceTickMsg, ProgressTickMsg};

/// Everything a module needs to come up: its identity, connector count,
/// the image it runs, and the protocol tunables.
#[derive(Debug)]
pub struct ModuleConfig {
    pub id: u8,
    pub connectors: usize,
    pub running: Firmware,
    pub fdp: rofinet_fdp::engine::Config,
}

/// One entry of the scheduler's event queue. Link driver callbacks only
/// ever enqueue; all protocol state is touched by the scheduler alone.
#[derive(Debug)]
pub enum SchedulerInput {
    Frame(ConnectorId, LinkFrame),
    Event(ConnectorId, LinkEvent),
}

// Ingress of a mated peer connector.
#[derive(Clone, Debug)]
pub(crate) struct PeerHandle {
    pub(crate) queue: Arc<BoundedQueue<SchedulerInput>>,
    pub(crate) connector: ConnectorId,
}

/// One RoFI module: the interface registry and routing engine, the
/// firmware engine, and the scheduler state gluing them to the
/// connectors.
#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub rrp: Instance,
    pub fdp: UpdateProtocol,
    pub(crate) queue: Arc<BoundedQueue<SchedulerInput>>,
    pub(crate) peers: Vec<Option<PeerHandle>>,
    links: Vec<LinkTx>,
    egress: UnboundedReceiver<(ConnectorId, LinkFrame)>,
    // Ordinary IPv6 traffic is handed to the host stack input.
    host_ip: Option<UnboundedSender<(ConnectorId, Bytes)>>,
}

// ===== impl Module =====

impl Module {
    pub fn new(
        config: ModuleConfig,
        route_port: Box<dyn RouteTablePort>,
        running_partition: Box<dyn Partition>,
        update_slot: Box<dyn UpdatePartition>,
    ) -> Module {
        let queue =
            Arc::new(BoundedQueue::new(config.fdp.event_queue_depth));
        let (egress_tx, egress_rx) = mpsc::unbounded_channel();

        // One interface per connector, plus the loopback the registry
        // brings along.
        let mut rrp =
            Instance::new(format!("rofi-{}", config.id), route_port);
        let phys_addr = PhysAddr::from_module_id(config.id);
        let mut links = vec![];
        for connector in 0..config.connectors as ConnectorId {
            let link = LinkTx::new(connector, egress_tx.clone());
            rrp.add_connector(connector, phys_addr, link.clone());
            links.push(link);
        }
        rrp.add_address(default_address(config.id));

        let fdp = UpdateProtocol::new(
            config.fdp,
            config.running,
            running_partition,
            update_slot,
            links.clone(),
        );

        Module {
            name: format!("rofi-{}", config.id),
            rrp,
            fdp,
            queue,
            peers: vec![None; config.connectors],
            links,
            egress: egress_rx,
            host_ip: None,
        }
    }

    /// Where ordinary (non-protocol) IPv6 frames are delivered.
    pub fn set_host_ip_input(
        &mut self,
        input: UnboundedSender<(ConnectorId, Bytes)>,
    ) {
        self.host_ip = Some(input);
    }

    /// Outbound path for the host stack: pushes an ordinary IPv6 packet
    /// out of the given connector.
    pub fn send_host_frame(
        &mut self,
        connector: ConnectorId,
        payload: Bytes,
    ) -> Result<(), LinkSendError> {
        let link = self
            .links
            .iter()
            .find(|link| link.connector() == connector)
            .ok_or(LinkSendError)?;
        link.send(CONTENT_TYPE_IP, payload)
    }

    /// Runs the scheduler until a stop request arrives. Packet work is
    /// fully handled before the next entry is dequeued; timer-driven work
    /// arrives as messages from the interval tasks.
    pub async fn run(&mut self, mut stop: Receiver<()>) {
        let (announce_tickp, mut announce_tickc) = mpsc::channel(4);
        let _announce_task = tasks::announce_interval(
            self.fdp.config().announce_period,
            &announce_tickp,
        );
        let (progress_tickp, mut progress_tickc) = mpsc::channel(4);
        let _progress_task = tasks::progress_interval(
            self.fdp.config().progress_check_period,
            &progress_tickp,
        );

        let queue = self.queue.clone();
        loop {
            tokio::select! {
                _ = stop.recv() => break,
                input = queue.pop() => {
                    self.dispatch(input);
                }
                Some(AnnounceTickMsg {}) = announce_tickc.recv() => {
                    self.fdp.announce_running_firmware();
                }
                Some(ProgressTickMsg {}) = progress_tickc.recv() => {
                    self.fdp.check_progress(now_secs());
                }
            }
            self.deliver_egress();
        }
    }

    /// Synchronously drains the event queue. Returns how many entries
    /// were handled.
    pub fn process_pending(&mut self) -> usize {
        let mut count = 0;
        while let Some(input) = self.queue.try_pop() {
            self.dispatch(input);
            count += 1;
        }
        count
    }

    /// Pushes buffered outbound frames to the mated peers. Frames for
    /// unmated connectors are dropped. Returns how many frames moved.
    pub fn deliver_egress(&mut self) -> usize {
        let mut count = 0;
        while let Ok((connector, frame)) = self.egress.try_recv() {
            let Some(peer) = &self.peers[connector as usize] else {
                continue;
            };
            let dropped = peer
                .queue
                .push(SchedulerInput::Frame(peer.connector, frame));
            if dropped {
                // Bounded-queue policy; the next periodic announce or
                // call repairs whatever was lost.
                warn!(connector = %peer.connector,
                    "peer event queue overflow, oldest entry dropped");
            }
            count += 1;
        }
        count
    }

    /// Fires the periodic firmware announce, as the announce timer would.
    pub fn announce_tick(&mut self) {
        self.fdp.announce_running_firmware();
    }

    /// Fires the update progress check, as the progress timer would.
    pub fn progress_tick(&mut self) {
        self.fdp.check_progress(now_secs());
    }

    // Classifies one queue entry: connector events and RRP multicast go
    // to the routing engine, content-type 3 to the firmware engine, and
    // everything else to the host stack.
    fn dispatch(&mut self, input: SchedulerInput) {
        match input {
            SchedulerInput::Event(connector, event) => {
                self.rrp.process_link_event(connector, event);
            }
            SchedulerInput::Frame(connector, frame) => {
                match frame.content_type {
                    CONTENT_TYPE_IP => {
                        self.dispatch_ip(connector, frame.payload)
                    }
                    CONTENT_TYPE_FDP => {
                        self.dispatch_fdp(connector, frame.payload)
                    }
                    _ => (),
                }
            }
        }
    }

    fn dispatch_ip(&mut self, connector: ConnectorId, payload: Bytes) {
        if ipv6_destination(&payload) == Some(RRP_MULTICAST_GROUP) {
            if let Some(payload) = strip_ipv6(&payload) {
                self.rrp.process_packet(connector, payload);
            }
            return;
        }

        if let Some(host_ip) = &self.host_ip {
            let _ = host_ip.send((connector, payload));
        }
    }

    fn dispatch_fdp(&mut self, connector: ConnectorId, payload: Bytes) {
        match Message::decode(&payload, connector) {
            Ok(msg) => self.fdp.process_message(msg, now_secs()),
            Err(error) => FdpError::MessageDecodeError(error).log(),
        }
    }
}

// ===== global functions =====

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}
