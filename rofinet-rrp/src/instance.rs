//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use chrono::{DateTime, Utc};
use ipnetwork::Ipv6Network;
use rofinet_utils::link::{ConnectorId, LinkEvent, LinkTx, PhysAddr};
use rofinet_utils::southbound::RouteTablePort;

use crate::debug::Debug;
use crate::interface::{InterfaceIndex, Interfaces, MAX_GLOBAL_ADDRS};
use crate::packet::{Command, Pdu};
use crate::table::RoutingTable;
use crate::{events, output};

/// Per-module RRP state: the interface registry, the routing table and
/// message counters.
///
/// The instance is a passive state machine; the module scheduler owns it
/// and feeds it connector events and received packets one at a time.
#[derive(Debug)]
pub struct Instance {
    pub name: String,
    pub interfaces: Interfaces,
    pub table: RoutingTable,
    pub statistics: MessageStatistics,
}

// Inbound and outbound statistic counters.
#[derive(Debug, Default)]
pub struct MessageStatistics {
    pub discontinuity_time: Option<DateTime<Utc>>,
    pub pdus_rcvd: u32,
    pub pdus_sent: u32,
    pub bad_packets_rcvd: u32,
}

// ===== impl MessageStatistics =====

impl MessageStatistics {
    pub(crate) fn update_discontinuity_time(&mut self) {
        self.discontinuity_time = Some(Utc::now());
    }
}

// ===== impl Instance =====

impl Instance {
    pub fn new(name: String, port: Box<dyn RouteTablePort>) -> Instance {
        Debug::InstanceCreate.log();

        Instance {
            name,
            interfaces: Interfaces::new(),
            table: RoutingTable::new(port),
            statistics: Default::default(),
        }
    }

    /// Registers the interface backing one docking connector. Called once
    /// per connector at module boot.
    pub fn add_connector(
        &mut self,
        connector: ConnectorId,
        phys_addr: PhysAddr,
        link: LinkTx,
    ) -> InterfaceIndex {
        self.interfaces.add_physical(connector, phys_addr, link)
    }

    /// Adds a global address, inserts it as a locally attached record and
    /// announces the change.
    pub fn add_address(&mut self, prefix: Ipv6Network) -> bool {
        let loopback = self.interfaces.loopback();
        let iface = &mut self.interfaces[loopback];
        if iface.addrs.len() >= MAX_GLOBAL_ADDRS
            || !iface.addrs.insert(prefix)
        {
            return false;
        }
        Debug::AddressAdd(&prefix).log();

        if self.table.add(prefix, 0, loopback, &self.interfaces) {
            self.announce();
        }
        true
    }

    /// Removes a global address along with its record and announces the
    /// change.
    pub fn remove_address(&mut self, prefix: Ipv6Network) -> bool {
        let loopback = self.interfaces.loopback();
        if !self.interfaces[loopback].addrs.remove(&prefix) {
            return false;
        }
        Debug::AddressDelete(&prefix).log();

        if self.table.remove(prefix, loopback, &self.interfaces) {
            self.announce();
        }
        true
    }

    /// Connector state change from the link driver.
    pub fn process_link_event(
        &mut self,
        connector: ConnectorId,
        event: LinkEvent,
    ) {
        events::process_link_event(self, connector, event);
    }

    /// RRP packet delivered by the frame demultiplexer, IPv6 header
    /// already stripped.
    pub fn process_packet(
        &mut self,
        connector: ConnectorId,
        payload: &[u8],
    ) {
        let pdu = Pdu::decode(payload);
        events::process_pdu(self, connector, pdu);
    }

    // Pushes a table change to the network: the upstream when this module
    // is a stub, everyone otherwise.
    fn announce(&mut self) {
        if self.table.is_stub() {
            output::sync_upstream(self);
        } else {
            output::send_to_others(self, None, Command::Call);
        }
    }
}
