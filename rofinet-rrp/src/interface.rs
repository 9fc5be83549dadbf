//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::Ipv6Addr;

use bitflags::bitflags;
use generational_arena::{Arena, Index};
use ipnetwork::Ipv6Network;
use rofinet_utils::link::{ConnectorId, LinkTx, PhysAddr};

use crate::debug::Debug;

pub type InterfaceIndex = Index;

// Maximum number of global addresses per interface.
pub const MAX_GLOBAL_ADDRS: usize = 4;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct InterfaceFlags: u8 {
        const LOOPBACK = 0x01;
        // The underlying connector is mated.
        const ACTIVE = 0x02;
        // The most recent RRP message received here was Stubby.
        const STUB = 0x04;
    }
}

/// One virtual interface: the loopback or one docking connector.
///
/// Interfaces are created at boot and live for the module's lifetime;
/// a reconnect reuses the same interface.
#[derive(Debug)]
pub struct Interface {
    pub name: String,
    pub connector: Option<ConnectorId>,
    pub flags: InterfaceFlags,
    pub link_local: Ipv6Addr,
    pub addrs: BTreeSet<Ipv6Network>,
    pub link: Option<LinkTx>,
}

#[derive(Debug)]
pub struct Interfaces {
    arena: Arena<Interface>,
    name_tree: BTreeMap<String, InterfaceIndex>,
    connector_tree: HashMap<ConnectorId, InterfaceIndex>,
    loopback: InterfaceIndex,
}

// ===== impl Interface =====

impl Interface {
    pub fn is_loopback(&self) -> bool {
        self.flags.contains(InterfaceFlags::LOOPBACK)
    }

    pub fn is_active(&self) -> bool {
        self.flags.contains(InterfaceFlags::ACTIVE)
    }

    pub fn is_stub(&self) -> bool {
        self.flags.contains(InterfaceFlags::STUB)
    }
}

// ===== impl Interfaces =====

impl Interfaces {
    /// Creates the registry with its loopback interface.
    pub fn new() -> Interfaces {
        let mut arena = Arena::new();
        let mut name_tree = BTreeMap::new();

        let name = "rl0".to_owned();
        Debug::InterfaceCreate(&name).log();
        let loopback = arena.insert(Interface {
            name: name.clone(),
            connector: None,
            flags: InterfaceFlags::LOOPBACK | InterfaceFlags::ACTIVE,
            link_local: Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1),
            addrs: Default::default(),
            link: None,
        });
        name_tree.insert(name, loopback);

        Interfaces {
            arena,
            name_tree,
            connector_tree: Default::default(),
            loopback,
        }
    }

    /// Adds the interface backing one docking connector.
    ///
    /// The link-local address is derived from the physical address. The
    /// host stack side (interface registration and the ff02::1f multicast
    /// join) happens when the caller binds the interface to the stack.
    pub fn add_physical(
        &mut self,
        connector: ConnectorId,
        phys_addr: PhysAddr,
        link: LinkTx,
    ) -> InterfaceIndex {
        let name = format!("rd{connector}");
        Debug::InterfaceCreate(&name).log();

        let iface = Interface {
            name: name.clone(),
            connector: Some(connector),
            flags: InterfaceFlags::empty(),
            link_local: link_local_address(&phys_addr),
            addrs: Default::default(),
            link: Some(link),
        };
        let iface_idx = self.arena.insert(iface);
        self.name_tree.insert(name, iface_idx);
        self.connector_tree.insert(connector, iface_idx);

        iface_idx
    }

    pub fn loopback(&self) -> InterfaceIndex {
        self.loopback
    }

    // Returns a reference to the interface corresponding to the given
    // connector.
    pub fn get_by_connector(
        &self,
        connector: ConnectorId,
    ) -> Option<(InterfaceIndex, &Interface)> {
        self.connector_tree
            .get(&connector)
            .copied()
            .map(|iface_idx| (iface_idx, &self.arena[iface_idx]))
    }

    // Returns a reference to the interface corresponding to the given name.
    pub fn get_by_name(
        &self,
        ifname: &str,
    ) -> Option<(InterfaceIndex, &Interface)> {
        self.name_tree
            .get(ifname)
            .copied()
            .map(|iface_idx| (iface_idx, &self.arena[iface_idx]))
    }

    // Returns an iterator visiting all interfaces.
    //
    // Interfaces are ordered by their names.
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (InterfaceIndex, &'_ Interface)> + '_ {
        self.name_tree
            .values()
            .map(|iface_idx| (*iface_idx, &self.arena[*iface_idx]))
    }
}

impl std::ops::Index<InterfaceIndex> for Interfaces {
    type Output = Interface;

    fn index(&self, index: InterfaceIndex) -> &Self::Output {
        &self.arena[index]
    }
}

impl std::ops::IndexMut<InterfaceIndex> for Interfaces {
    fn index_mut(&mut self, index: InterfaceIndex) -> &mut Self::Output {
        &mut self.arena[index]
    }
}

// ===== global functions =====

// Modified EUI-64 interface identifier under fe80::/64.
fn link_local_address(phys_addr: &PhysAddr) -> Ipv6Addr {
    let a = phys_addr.0;
    let mut bytes = [0; 16];
    bytes[0] = 0xfe;
    bytes[1] = 0x80;
    bytes[8..16].copy_from_slice(&[
        a[0] ^ 0x02,
        a[1],
        a[2],
        0xff,
        0xfe,
        a[3],
        a[4],
        a[5],
    ]);
    Ipv6Addr::from(bytes)
}

/// Default global address of a module: `fc07::<id>:0:0:1/80`.
///
/// This is a deployment convention, not a protocol requirement; any
/// address added explicitly takes its place.
pub fn default_address(id: u8) -> Ipv6Network {
    let addr = Ipv6Addr::new(0xfc07, 0, 0, 0, id.into(), 0, 0, 1);
    Ipv6Network::new(addr, 80).unwrap()
}

// ===== tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_address() {
        assert_eq!(
            default_address(7),
            "fc07::7:0:0:1/80".parse::<Ipv6Network>().unwrap()
        );
    }

    #[test]
    fn test_link_local_derivation() {
        let addr = link_local_address(&PhysAddr::from_module_id(3));
        assert_eq!(
            addr,
            "fe80::103:3ff:fe03:303".parse::<Ipv6Addr>().unwrap()
        );
    }
}
