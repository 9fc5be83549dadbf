//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv6Addr;
use std::sync::{Arc, Mutex};

use ipnetwork::Ipv6Network;

/// Forwarding-table surface of the host IPv6 stack.
///
/// The routing table is the only caller. It installs a route whenever a
/// record is created, retargets it whenever the record's active gateway
/// changes, and removes it when the record is destroyed.
pub trait RouteTablePort: Send + std::fmt::Debug {
    fn install_route(&mut self, prefix: Ipv6Network, ifname: &str);
    fn update_route(&mut self, prefix: Ipv6Network, ifname: &str);
    fn remove_route(&mut self, prefix: Ipv6Network);
    fn find_route(&self, dst: Ipv6Addr) -> Option<String>;
}

/// One recorded forwarding-table mutation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RouteOp {
    Install(Ipv6Network, String),
    Update(Ipv6Network, String),
    Remove(Ipv6Network),
}

/// Recording implementation of [`RouteTablePort`].
///
/// Keeps a log of every mutation and mirrors the resulting forwarding
/// state, so tests and the simulator can inspect what the host stack would
/// have been told.
#[derive(Debug, Default)]
pub struct RouteLog {
    pub ops: Vec<RouteOp>,
    routes: Vec<(Ipv6Network, String)>,
}

// ===== impl RouteLog =====

impl RouteLog {
    pub fn new() -> RouteLog {
        Default::default()
    }

    /// Returns the interface the given prefix currently resolves to.
    pub fn get(&self, prefix: &Ipv6Network) -> Option<&str> {
        self.routes
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, ifname)| ifname.as_str())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl RouteTablePort for RouteLog {
    fn install_route(&mut self, prefix: Ipv6Network, ifname: &str) {
        self.ops.push(RouteOp::Install(prefix, ifname.to_owned()));
        self.routes.retain(|(p, _)| *p != prefix);
        self.routes.push((prefix, ifname.to_owned()));
    }

    fn update_route(&mut self, prefix: Ipv6Network, ifname: &str) {
        self.ops.push(RouteOp::Update(prefix, ifname.to_owned()));
        if let Some(entry) =
            self.routes.iter_mut().find(|(p, _)| *p == prefix)
        {
            entry.1 = ifname.to_owned();
        }
    }

    fn remove_route(&mut self, prefix: Ipv6Network) {
        self.ops.push(RouteOp::Remove(prefix));
        self.routes.retain(|(p, _)| *p != prefix);
    }

    fn find_route(&self, dst: Ipv6Addr) -> Option<String> {
        // Most specific containing prefix wins.
        self.routes
            .iter()
            .filter(|(p, _)| p.contains(dst))
            .max_by_key(|(p, _)| p.prefix())
            .map(|(_, ifname)| ifname.clone())
    }
}

/// Shareable [`RouteLog`]: the routing table owns one handle while a test
/// or the simulator inspects the log through another.
pub type SharedRouteLog = Arc<Mutex<RouteLog>>;

impl RouteTablePort for SharedRouteLog {
    fn install_route(&mut self, prefix: Ipv6Network, ifname: &str) {
        self.lock().unwrap().install_route(prefix, ifname)
    }

    fn update_route(&mut self, prefix: Ipv6Network, ifname: &str) {
        self.lock().unwrap().update_route(prefix, ifname)
    }

    fn remove_route(&mut self, prefix: Ipv6Network) {
        self.lock().unwrap().remove_route(prefix)
    }

    fn find_route(&self, dst: Ipv6Addr) -> Option<String> {
        self.lock().unwrap().find_route(dst)
    }
}
