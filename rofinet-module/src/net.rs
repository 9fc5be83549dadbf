//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use rofinet_utils::link::{ConnectorId, LinkEvent};

use crate::module::{Module, PeerHandle, SchedulerInput};

// ===== global functions =====

/// Mates two connectors: wires each side's egress to the other's event
/// queue and surfaces the Connected event on both.
pub fn connect(
    a: &mut Module,
    a_connector: ConnectorId,
    b: &mut Module,
    b_connector: ConnectorId,
) {
    a.peers[a_connector as usize] = Some(PeerHandle {
        queue: b.queue.clone(),
        connector: b_connector,
    });
    b.peers[b_connector as usize] = Some(PeerHandle {
        queue: a.queue.clone(),
        connector: a_connector,
    });

    a.queue
        .push(SchedulerInput::Event(a_connector, LinkEvent::Connected));
    b.queue
        .push(SchedulerInput::Event(b_connector, LinkEvent::Connected));
}

/// Unmates two connectors, surfacing the Disconnected event on both.
pub fn disconnect(
    a: &mut Module,
    a_connector: ConnectorId,
    b: &mut Module,
    b_connector: ConnectorId,
) {
    a.peers[a_connector as usize] = None;
    b.peers[b_connector as usize] = None;

    a.queue.push(SchedulerInput::Event(
        a_connector,
        LinkEvent::Disconnected,
    ));
    b.queue.push(SchedulerInput::Event(
        b_connector,
        LinkEvent::Disconnected,
    ));
}

/// Alternates between processing and frame delivery until the whole mesh
/// goes quiet. Returns the number of rounds it took.
///
/// The mesh converges on its own; the bound only keeps a broken build
/// from spinning a test forever.
pub fn settle(modules: &mut [&mut Module]) -> usize {
    const MAX_ROUNDS: usize = 1000;

    for round in 0..MAX_ROUNDS {
        let mut activity = 0;
        for module in modules.iter_mut() {
            activity += module.process_pending();
            activity += module.deliver_egress();
        }
        if activity == 0 {
            return round;
        }
    }
    MAX_ROUNDS
}
