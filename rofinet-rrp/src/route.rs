//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::Ipv6Network;
use smallvec::{SmallVec, smallvec};

use crate::interface::InterfaceIndex;

/// Path cost in hops. Zero means locally attached.
pub type Cost = u32;

/// One nexthop of a record: the interface the prefix is reachable through
/// and the cost of the path behind it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Gateway {
    pub iface: InterfaceIndex,
    pub cost: Cost,
}

/// One routing entry.
///
/// The gateway list is kept sorted by ascending cost, ties broken by
/// insertion order, and holds at most one entry per interface. The first
/// gateway is the active one; it is what the host forwarding table points
/// to. A record with no gateways does not exist.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    pub prefix: Ipv6Network,
    pub gws: SmallVec<[Gateway; 2]>,
}

// ===== impl Record =====

impl Record {
    pub(crate) fn new(prefix: Ipv6Network, gw: Gateway) -> Record {
        Record {
            prefix,
            gws: smallvec![gw],
        }
    }

    /// Returns the active gateway.
    pub fn active(&self) -> &Gateway {
        &self.gws[0]
    }

    pub fn cost(&self) -> Cost {
        self.active().cost
    }

    /// Merges a gateway into the ordered list.
    ///
    /// An already known (interface, cost) pair is a no-op; a strictly
    /// better cost for a known interface replaces the old entry. Returns
    /// whether the gateway set changed.
    pub(crate) fn merge(&mut self, gw: Gateway) -> bool {
        if let Some(pos) =
            self.gws.iter().position(|g| g.iface == gw.iface)
        {
            if gw.cost >= self.gws[pos].cost {
                return false;
            }
            self.gws.remove(pos);
        }

        // Insert after every entry of lower or equal cost.
        let pos = self
            .gws
            .iter()
            .position(|g| g.cost > gw.cost)
            .unwrap_or(self.gws.len());
        self.gws.insert(pos, gw);
        true
    }

    /// Removes the gateway going through the given interface. Returns
    /// whether the gateway set changed.
    pub(crate) fn remove_via(&mut self, iface: InterfaceIndex) -> bool {
        let len = self.gws.len();
        self.gws.retain(|g| g.iface != iface);
        len != self.gws.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.gws.is_empty()
    }
}

// ===== tests =====

#[cfg(test)]
mod tests {
    use generational_arena::Arena;

    use super::*;

    fn indexes(count: usize) -> Vec<InterfaceIndex> {
        let mut arena = Arena::new();
        (0..count).map(|i| arena.insert(i)).collect()
    }

    fn prefix() -> Ipv6Network {
        "fc07::1:0:0:1/80".parse().unwrap()
    }

    #[test]
    fn test_merge_sorted() {
        let idx = indexes(3);
        let mut rec = Record::new(
            prefix(),
            Gateway {
                iface: idx[0],
                cost: 2,
            },
        );

        assert!(rec.merge(Gateway {
            iface: idx[1],
            cost: 1,
        }));
        assert!(rec.merge(Gateway {
            iface: idx[2],
            cost: 3,
        }));

        let costs = rec.gws.iter().map(|g| g.cost).collect::<Vec<_>>();
        assert_eq!(costs, vec![1, 2, 3]);
        assert_eq!(rec.active().iface, idx[1]);
    }

    #[test]
    fn test_merge_duplicate() {
        let idx = indexes(1);
        let gw = Gateway {
            iface: idx[0],
            cost: 1,
        };
        let mut rec = Record::new(prefix(), gw);

        // Same pair is a no-op, worse cost is a no-op.
        assert!(!rec.merge(gw));
        assert!(!rec.merge(Gateway {
            iface: idx[0],
            cost: 5,
        }));
        assert_eq!(rec.gws.len(), 1);

        // A better cost replaces the old entry.
        assert!(rec.merge(Gateway {
            iface: idx[0],
            cost: 0,
        }));
        assert_eq!(rec.gws.len(), 1);
        assert_eq!(rec.cost(), 0);
    }

    #[test]
    fn test_merge_tie_keeps_first() {
        let idx = indexes(2);
        let mut rec = Record::new(
            prefix(),
            Gateway {
                iface: idx[0],
                cost: 1,
            },
        );

        assert!(rec.merge(Gateway {
            iface: idx[1],
            cost: 1,
        }));
        assert_eq!(rec.active().iface, idx[0]);
    }

    #[test]
    fn test_remove_via() {
        let idx = indexes(2);
        let mut rec = Record::new(
            prefix(),
            Gateway {
                iface: idx[0],
                cost: 1,
            },
        );
        rec.merge(Gateway {
            iface: idx[1],
            cost: 2,
        });

        assert!(rec.remove_via(idx[0]));
        assert_eq!(rec.active().iface, idx[1]);
        assert!(!rec.remove_via(idx[0]));
        assert!(rec.remove_via(idx[1]));
        assert!(rec.is_empty());
    }
}
