//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::Ipv6Network;
use tracing::{debug, debug_span};

use crate::packet::Pdu;
use crate::route::Cost;

// RRP debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    InstanceCreate,
    InterfaceCreate(&'a str),
    LinkUp(&'a str),
    LinkDown(&'a str),
    PduRx(&'a str, &'a Pdu),
    PduTx(&'a str, &'a Pdu),
    AddressAdd(&'a Ipv6Network),
    AddressDelete(&'a Ipv6Network),
    RecordCreate(&'a Ipv6Network, &'a str, Cost),
    RecordUpdate(&'a Ipv6Network, &'a str, Cost),
    RecordDelete(&'a Ipv6Network),
    StubEnter(&'a str),
    StubLeave,
    SyncUpstream(&'a str),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::InstanceCreate => {
                // Parent span(s): rofi-module
                debug!("{}", self);
            }
            Debug::InterfaceCreate(name)
            | Debug::LinkUp(name)
            | Debug::LinkDown(name) => {
                // Parent span(s): rofi-module
                debug_span!("interface", %name).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::PduRx(interface, pdu) => {
                // Parent span(s): rofi-module
                debug_span!("network").in_scope(|| {
                    debug_span!("input", %interface).in_scope(|| {
                        let data = serde_json::to_string(&pdu).unwrap();
                        debug!(%data, "{}", self);
                    });
                });
            }
            Debug::PduTx(interface, pdu) => {
                // Parent span(s): rofi-module
                debug_span!("network").in_scope(|| {
                    debug_span!("output", %interface).in_scope(|| {
                        let data = serde_json::to_string(&pdu).unwrap();
                        debug!(%data, "{}", self);
                    });
                });
            }
            Debug::AddressAdd(addr) | Debug::AddressDelete(addr) => {
                // Parent span(s): rofi-module
                debug!(address = %addr, "{}", self);
            }
            Debug::RecordCreate(prefix, gateway, cost)
            | Debug::RecordUpdate(prefix, gateway, cost) => {
                // Parent span(s): rofi-module
                debug!(%prefix, %gateway, %cost, "{}", self);
            }
            Debug::RecordDelete(prefix) => {
                // Parent span(s): rofi-module
                debug!(%prefix, "{}", self);
            }
            Debug::StubEnter(upstream) | Debug::SyncUpstream(upstream) => {
                // Parent span(s): rofi-module
                debug!(%upstream, "{}", self);
            }
            Debug::StubLeave => {
                // Parent span(s): rofi-module
                debug!("{}", self);
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::InstanceCreate => {
                write!(f, "instance created")
            }
            Debug::InterfaceCreate(..) => {
                write!(f, "interface created")
            }
            Debug::LinkUp(..) => {
                write!(f, "link up")
            }
            Debug::LinkDown(..) => {
                write!(f, "link down")
            }
            Debug::PduRx(..) | Debug::PduTx(..) => {
                write!(f, "pdu")
            }
            Debug::AddressAdd(..) => {
                write!(f, "address added")
            }
            Debug::AddressDelete(..) => {
                write!(f, "address deleted")
            }
            Debug::RecordCreate(..) => {
                write!(f, "record created")
            }
            Debug::RecordUpdate(..) => {
                write!(f, "record updated")
            }
            Debug::RecordDelete(..) => {
                write!(f, "record deleted")
            }
            Debug::StubEnter(..) => {
                write!(f, "entering stub mode")
            }
            Debug::StubLeave => {
                write!(f, "leaving stub mode")
            }
            Debug::SyncUpstream(..) => {
                write!(f, "syncing stub upstream")
            }
        }
    }
}
