//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv6Addr;

use bytes::{BufMut, Bytes, BytesMut};
use rofinet_utils::link::CONTENT_TYPE_IP;

use crate::debug::Debug;
use crate::error::Error;
use crate::instance::Instance;
use crate::interface::InterfaceIndex;
use crate::packet::{Command, RRP_MULTICAST_GROUP};

pub const IPV6_HDR_LENGTH: usize = 40;

// IPv6 protocol number RRP packets are tagged with.
const RRP_IP_PROTO: u8 = 58;

// ===== global functions =====

// Serializes the table view for one interface and pushes it out of that
// link inside a raw IPv6 packet to the RRP multicast group.
pub(crate) fn send_pdu(
    instance: &mut Instance,
    iface_idx: InterfaceIndex,
    cmd: Command,
) {
    // A Call created for a dead link would leave its answer outstanding
    // forever, so bail out before the counter moves.
    if !instance.interfaces[iface_idx].is_active() {
        return;
    }

    let pdu =
        instance
            .table
            .create_rrp(cmd, Some(iface_idx), &instance.interfaces);
    let iface = &instance.interfaces[iface_idx];
    let Some(link) = &iface.link else {
        return;
    };

    Debug::PduTx(&iface.name, &pdu).log();

    let frame = raw_ipv6(&iface.link_local, &pdu.encode());
    if link.send(CONTENT_TYPE_IP, frame).is_err() {
        Error::LinkSendError(iface.name.clone()).log();
        return;
    }

    // Whatever changed is on the wire now.
    instance.table.clear_pending_changes();
    instance.statistics.pdus_sent += 1;
    instance.statistics.update_discontinuity_time();
}

// Fans the given command out to every active interface, skipping the
// loopback, the excluded interface and stub-flagged neighbors (a stub
// leaf has nothing to learn from the body).
pub(crate) fn send_to_others(
    instance: &mut Instance,
    except: Option<InterfaceIndex>,
    cmd: Command,
) {
    let targets = instance
        .interfaces
        .iter()
        .filter(|(iface_idx, iface)| {
            !iface.is_loopback()
                && iface.is_active()
                && !iface.is_stub()
                && Some(*iface_idx) != except
        })
        .map(|(iface_idx, _)| iface_idx)
        .collect::<Vec<_>>();

    for iface_idx in targets {
        send_pdu(instance, iface_idx, cmd);
    }
}

// Pushes the full table to the stub upstream.
pub(crate) fn sync_upstream(instance: &mut Instance) {
    let Some(upstream) = instance.table.stub_upstream() else {
        return;
    };

    Debug::SyncUpstream(&instance.interfaces[upstream].name).log();
    send_pdu(instance, upstream, Command::Sync);
}

// Wraps an RRP payload in a raw IPv6 packet addressed to the link-scoped
// multicast group. The host stack owns real IPv6 processing; this header
// exists so the receiving side can classify the frame.
fn raw_ipv6(src: &Ipv6Addr, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(IPV6_HDR_LENGTH + payload.len());
    buf.put_u32(0x6000_0000);
    buf.put_u16(payload.len() as u16);
    buf.put_u8(RRP_IP_PROTO);
    // Hop limit 1: RRP never leaves the link.
    buf.put_u8(1);
    buf.put_slice(&src.octets());
    buf.put_slice(&RRP_MULTICAST_GROUP.octets());
    buf.put_slice(payload);
    buf.freeze()
}

// Strips the IPv6 header off an inbound RRP packet.
pub fn strip_ipv6(frame: &[u8]) -> Option<&[u8]> {
    frame.get(IPV6_HDR_LENGTH..)
}
