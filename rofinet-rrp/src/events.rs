//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use rofinet_utils::link::{ConnectorId, LinkEvent};

use crate::debug::Debug;
use crate::error::Error;
use crate::instance::Instance;
use crate::interface::{InterfaceFlags, InterfaceIndex};
use crate::output;
use crate::packet::{Command, DecodeResult, Pdu};
use crate::table::Action;

// ===== connector state changes =====

pub(crate) fn process_link_event(
    instance: &mut Instance,
    connector: ConnectorId,
    event: LinkEvent,
) {
    let Some((iface_idx, _)) = instance.interfaces.get_by_connector(connector)
    else {
        Error::InterfaceNotFound(connector).log();
        return;
    };

    match event {
        LinkEvent::Connected => {
            process_link_up(instance, iface_idx);
        }
        LinkEvent::Disconnected => {
            process_link_down(instance, iface_idx);
        }
    }
}

fn process_link_up(instance: &mut Instance, iface_idx: InterfaceIndex) {
    let iface = &mut instance.interfaces[iface_idx];
    Debug::LinkUp(&iface.name).log();
    iface.flags.insert(InterfaceFlags::ACTIVE);

    // Introduce ourselves to the new neighbor.
    output::send_pdu(instance, iface_idx, Command::Hello);
}

fn process_link_down(instance: &mut Instance, iface_idx: InterfaceIndex) {
    let iface = &mut instance.interfaces[iface_idx];
    Debug::LinkDown(&iface.name).log();
    iface
        .flags
        .remove(InterfaceFlags::ACTIVE | InterfaceFlags::STUB);

    instance
        .table
        .remove_for_if(iface_idx, &instance.interfaces);

    if instance.table.is_stub() {
        if instance.table.stub_upstream() == Some(iface_idx) {
            // The upstream is gone; elect a new one by re-introducing
            // ourselves on the remaining links.
            instance.table.destroy_stub(&instance.interfaces);
            dispatch_action(instance, Action::HelloToAll, iface_idx);
        } else {
            output::sync_upstream(instance);
        }
        return;
    }

    dispatch_action(instance, Action::CallToAll, iface_idx);
}

// ===== RRP packet receipt =====

pub(crate) fn process_pdu(
    instance: &mut Instance,
    connector: ConnectorId,
    pdu: DecodeResult<Pdu>,
) {
    let Some((iface_idx, iface)) =
        instance.interfaces.get_by_connector(connector)
    else {
        Error::InterfaceNotFound(connector).log();
        return;
    };

    let pdu = match pdu {
        Ok(pdu) => pdu,
        Err(error) => {
            // Malformed input mutates nothing.
            Error::PduDecodeError(error).log();
            instance.statistics.bad_packets_rcvd += 1;
            instance.statistics.update_discontinuity_time();
            return;
        }
    };

    Debug::PduRx(&iface.name, &pdu).log();
    instance.statistics.pdus_rcvd += 1;
    instance.statistics.update_discontinuity_time();

    let action =
        instance
            .table
            .update(&pdu, iface_idx, &mut instance.interfaces);

    if let Err(reason) = instance.table.check_invariants() {
        Error::InvariantViolation(reason).log();
        instance.table.reset(&instance.interfaces);
        return;
    }

    dispatch_action(instance, action, iface_idx);
}

// Translates the table's verdict into transmissions.
//
// A leaf answers with Stubby when it broadcasts its new role, and keeps
// its upstream current with full-table Syncs afterwards; the idle sync is
// gated on actual table changes so an unchanged exchange dies out.
pub(crate) fn dispatch_action(
    instance: &mut Instance,
    action: Action,
    source: InterfaceIndex,
) {
    let stub = instance.table.is_stub();

    match action {
        Action::Nothing => {
            if stub && instance.table.has_pending_changes() {
                output::sync_upstream(instance);
            }
        }
        Action::Respond => {
            if stub {
                output::send_pdu(instance, source, Command::Sync);
            } else {
                output::send_pdu(instance, source, Command::Response);
            }
        }
        Action::RespondToAll => {
            output::send_to_others(instance, Some(source), Command::Call);
            let reply = if stub { Command::Stubby } else { Command::Response };
            output::send_pdu(instance, source, reply);
        }
        Action::CallToAll => {
            if stub {
                output::sync_upstream(instance);
            } else {
                output::send_to_others(
                    instance,
                    Some(source),
                    Command::Call,
                );
                output::send_pdu(instance, source, Command::Call);
            }
        }
        Action::HelloToAll => {
            output::send_to_others(instance, Some(source), Command::Hello);
            output::send_pdu(instance, source, Command::Hello);
        }
        Action::OnHello => {
            if stub {
                output::sync_upstream(instance);
            } else {
                output::send_to_others(
                    instance,
                    Some(source),
                    Command::Call,
                );
            }
            output::send_pdu(instance, source, Command::HelloResponse);
        }
    }
}
