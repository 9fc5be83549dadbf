//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::net::Ipv6Addr;

use ipnetwork::Ipv6Network;
use itertools::Itertools;
use rofinet_utils::southbound::RouteTablePort;

use crate::debug::Debug;
use crate::interface::{InterfaceFlags, InterfaceIndex, Interfaces};
use crate::packet::{Command, Pdu, RouteEntry};
use crate::route::{Cost, Gateway, Record};

/// What the per-link state machine must transmit after integrating a
/// received payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    Nothing,
    Respond,
    RespondToAll,
    CallToAll,
    HelloToAll,
    OnHello,
}

/// The module's routing table.
///
/// Owns its records; destroying a record is what withdraws the route from
/// the host forwarding table. The sync counter tracks Call messages sent
/// and not yet answered; the table is in sync when it reaches zero. The
/// stub pointer names the single upstream interface while the stub
/// optimization is in effect.
#[derive(Debug)]
pub struct RoutingTable {
    records: BTreeMap<Ipv6Network, Record>,
    stub: Option<InterfaceIndex>,
    sync_counter: u32,
    // Table changed since the last advertisement.
    pending: bool,
    port: Box<dyn RouteTablePort>,
}

// ===== impl RoutingTable =====

impl RoutingTable {
    pub fn new(port: Box<dyn RouteTablePort>) -> RoutingTable {
        RoutingTable {
            records: Default::default(),
            stub: None,
            sync_counter: 0,
            pending: false,
            port,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'_ Record> + '_ {
        self.records.values()
    }

    pub fn search(&self, prefix: &Ipv6Network) -> Option<&Record> {
        self.records.get(prefix)
    }

    pub fn is_stub(&self) -> bool {
        self.stub.is_some()
    }

    pub fn stub_upstream(&self) -> Option<InterfaceIndex> {
        self.stub
    }

    pub fn is_synced(&self) -> bool {
        self.sync_counter == 0
    }

    pub fn sync_counter(&self) -> u32 {
        self.sync_counter
    }

    /// Whether the table changed since the last advertisement went out.
    pub fn has_pending_changes(&self) -> bool {
        self.pending
    }

    pub(crate) fn clear_pending_changes(&mut self) {
        self.pending = false;
    }

    /// Find-or-create the record and merge the gateway in. Returns whether
    /// the gateway set changed.
    pub fn add(
        &mut self,
        prefix: Ipv6Network,
        cost: Cost,
        via: InterfaceIndex,
        interfaces: &Interfaces,
    ) -> bool {
        let gw = Gateway { iface: via, cost };

        match self.records.entry(prefix) {
            btree_map::Entry::Occupied(mut o) => {
                let record = o.get_mut();
                let old_active = *record.active();
                if !record.merge(gw) {
                    return false;
                }
                self.pending = true;

                // Retarget the external route when the active gateway
                // changed.
                let new_active = *record.active();
                if new_active != old_active {
                    let ifname = &interfaces[new_active.iface].name;
                    Debug::RecordUpdate(&prefix, ifname, new_active.cost)
                        .log();
                    self.port.update_route(prefix, ifname);
                }
                true
            }
            btree_map::Entry::Vacant(v) => {
                let ifname = &interfaces[via].name;
                Debug::RecordCreate(&prefix, ifname, cost).log();
                self.pending = true;
                self.port.install_route(prefix, ifname);
                v.insert(Record::new(prefix, gw));
                true
            }
        }
    }

    /// Removes the gateway through `via`; destroys the record if it was
    /// the last one.
    pub fn remove(
        &mut self,
        prefix: Ipv6Network,
        via: InterfaceIndex,
        interfaces: &Interfaces,
    ) -> bool {
        let Some(record) = self.records.get_mut(&prefix) else {
            return false;
        };

        let old_active = *record.active();
        if !record.remove_via(via) {
            return false;
        }
        self.pending = true;

        if record.is_empty() {
            Debug::RecordDelete(&prefix).log();
            self.records.remove(&prefix);
            self.port.remove_route(prefix);
        } else {
            let new_active = *record.active();
            if new_active != old_active {
                let ifname = &interfaces[new_active.iface].name;
                Debug::RecordUpdate(&prefix, ifname, new_active.cost).log();
                self.port.update_route(prefix, ifname);
            }
        }
        true
    }

    /// Purges every gateway referring to the given interface; destroys
    /// records that become empty.
    pub fn remove_for_if(
        &mut self,
        iface: InterfaceIndex,
        interfaces: &Interfaces,
    ) -> bool {
        self.sweep(iface, interfaces, None)
    }

    fn sweep(
        &mut self,
        iface: InterfaceIndex,
        interfaces: &Interfaces,
        skip: Option<Ipv6Network>,
    ) -> bool {
        let mut changed = false;
        let mut destroyed = vec![];

        for (prefix, record) in self.records.iter_mut() {
            if skip == Some(*prefix) {
                continue;
            }
            let old_active = *record.active();
            if !record.remove_via(iface) {
                continue;
            }
            changed = true;

            if record.is_empty() {
                destroyed.push(*prefix);
                continue;
            }
            let new_active = *record.active();
            if new_active != old_active {
                let ifname = &interfaces[new_active.iface].name;
                Debug::RecordUpdate(prefix, ifname, new_active.cost).log();
                self.port.update_route(*prefix, ifname);
            }
        }

        for prefix in destroyed {
            Debug::RecordDelete(&prefix).log();
            self.records.remove(&prefix);
            self.port.remove_route(prefix);
        }
        self.pending |= changed;
        changed
    }

    /// Serializes the table into an RRP payload for one destination
    /// interface.
    ///
    /// Records reachable through the destination itself are always
    /// withheld from it. Outside the hello family, a stub-flagged
    /// destination additionally gets no body at all: a leaf only needs
    /// its default route. Advertised costs are the cost to reach the
    /// prefix through this module, hence one above the record's.
    ///
    /// Every Call leaves one more answer outstanding.
    pub fn create_rrp(
        &mut self,
        cmd: Command,
        except: Option<InterfaceIndex>,
        interfaces: &Interfaces,
    ) -> Pdu {
        if cmd == Command::Call {
            self.sync_counter += 1;
        }

        let except_is_stub = except
            .map(|iface_idx| interfaces[iface_idx].is_stub())
            .unwrap_or(false);
        if !cmd.is_hello_family() && except_is_stub {
            return Pdu::new(cmd, vec![]);
        }

        // The entry count on the wire is a single octet.
        let entries = self
            .records
            .values()
            .filter(|record| except != Some(record.active().iface))
            .map(|record| RouteEntry::new(record.prefix, record.cost() + 1))
            .take(u8::MAX as usize)
            .collect();

        Pdu::new(cmd, entries)
    }

    /// Integrates a received RRP payload and decides what to transmit in
    /// reaction.
    ///
    /// The change bit reflects the net effect on the table, not the
    /// purge/re-learn churn: a neighbor re-sending an unchanged view must
    /// not keep the mesh talking forever.
    pub fn update(
        &mut self,
        pdu: &Pdu,
        via: InterfaceIndex,
        interfaces: &mut Interfaces,
    ) -> Action {
        // The stub flag of an interface tracks the last command heard on
        // it.
        interfaces[via]
            .flags
            .set(InterfaceFlags::STUB, pdu.command == Command::Stubby);

        // Purge state learned through this interface, then re-learn from
        // the payload. The purge/re-learn churn itself does not count as
        // a change worth advertising.
        let pending = self.pending;
        let before = self.records.clone();
        self.purge_learned(via, interfaces);
        for entry in &pdu.entries {
            self.add(entry.prefix, entry.cost, via, interfaces);
        }
        let changed = self.records != before;
        self.pending = pending || changed;

        // Any non-Call message settles one outstanding Call.
        if pdu.command != Command::Call {
            self.sync_counter = self.sync_counter.saturating_sub(1);
        }

        let action = match pdu.command {
            Command::Hello => Action::OnHello,
            Command::Sync => Action::Nothing,
            Command::Call => {
                if changed && self.is_synced() {
                    Action::RespondToAll
                } else {
                    Action::Respond
                }
            }
            Command::Response
            | Command::Stubby
            | Command::HelloResponse => {
                if changed && self.is_synced() {
                    Action::CallToAll
                } else {
                    Action::Nothing
                }
            }
        };

        // Evaluate stub transitions; a transition overrides the action.
        if !self.is_stub() && self.should_be_stub(interfaces) {
            self.make_stub(interfaces);
            return Action::RespondToAll;
        }
        if self.is_stub() && !self.should_be_stub(interfaces) {
            self.destroy_stub(interfaces);
            return Action::CallToAll;
        }

        action
    }

    // Like `remove_for_if`, except that a stub's self-installed default
    // route is not learned state and survives updates from the upstream.
    fn purge_learned(
        &mut self,
        via: InterfaceIndex,
        interfaces: &Interfaces,
    ) {
        let skip = if self.stub == Some(via) {
            Some(default_prefix())
        } else {
            None
        };
        self.sweep(via, interfaces, skip);
    }

    /// Leaves stub mode, withdrawing the default route.
    pub fn destroy_stub(&mut self, _interfaces: &Interfaces) {
        if self.stub.take().is_none() {
            return;
        }
        Debug::StubLeave.log();
        self.pending = true;

        let prefix = default_prefix();
        if self.records.remove(&prefix).is_some() {
            Debug::RecordDelete(&prefix).log();
            self.port.remove_route(prefix);
        }
    }

    /// Routing-state recovery: drops every record and route, leaves stub
    /// mode and clears the sync counter.
    pub fn reset(&mut self, interfaces: &Interfaces) {
        self.destroy_stub(interfaces);
        for prefix in std::mem::take(&mut self.records).into_keys() {
            self.port.remove_route(prefix);
        }
        self.sync_counter = 0;
    }

    /// Checks the structural record invariants. A violation means the
    /// table can no longer be trusted and must be reset.
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        for record in self.records.values() {
            if record.is_empty() {
                return Err("record with no gateways");
            }
            if !record.gws.windows(2).all(|w| w[0].cost <= w[1].cost) {
                return Err("gateway list not cost-sorted");
            }
            if !record.gws.iter().map(|gw| gw.iface).all_unique() {
                return Err("duplicate gateway interface");
            }
        }
        Ok(())
    }

    // The interface behind which the whole network lies, if there is
    // exactly one: every record's active gateway is either local, behind a
    // stub neighbor, or goes through it. The current upstream keeps
    // counting even while the neighbor itself claims stubness, so a pair
    // of leaves facing each other does not tear its stub state down.
    fn single_egress(
        &self,
        interfaces: &Interfaces,
    ) -> Option<InterfaceIndex> {
        self.records
            .values()
            .map(Record::active)
            .filter(|gw| {
                let iface = &interfaces[gw.iface];
                !iface.is_loopback()
                    && (!iface.is_stub() || self.stub == Some(gw.iface))
            })
            .map(|gw| gw.iface)
            .all_equal_value()
            .ok()
    }

    fn should_be_stub(&self, interfaces: &Interfaces) -> bool {
        self.is_synced() && self.single_egress(interfaces).is_some()
    }

    fn make_stub(&mut self, interfaces: &Interfaces) {
        let Some(upstream) = self.single_egress(interfaces) else {
            return;
        };
        Debug::StubEnter(&interfaces[upstream].name).log();

        self.stub = Some(upstream);
        self.pending = true;
        self.remove_for_if(upstream, interfaces);
        self.add(default_prefix(), 0, upstream, interfaces);
    }
}

// ===== global functions =====

pub(crate) fn default_prefix() -> Ipv6Network {
    Ipv6Network::new(Ipv6Addr::UNSPECIFIED, 0).unwrap()
}

// ===== tests =====
