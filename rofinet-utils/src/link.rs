//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::UnboundedSender;

/// Identifies one docking connector of the local module.
///
/// Connector ids are small non-negative integers assigned at boot. The
/// value `-1` ([`CONNECTOR_SELF`]) stands for the module itself in contexts
/// where the module can be its own peer (e.g. the firmware request stores).
pub type ConnectorId = i8;

/// The module itself, used as a pseudo connector id.
pub const CONNECTOR_SELF: ConnectorId = -1;

/// Fixed per-link frame MTU in octets. IP fragmentation is handled by the
/// host stack.
pub const LINK_MTU: usize = 120;

// Link-layer content types.
pub const CONTENT_TYPE_IP: u16 = 0;
pub const CONTENT_TYPE_FDP: u16 = 3;

/// A 6-byte opaque link-layer address. Only ever copied into the link
/// header, never interpreted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PhysAddr(pub [u8; 6]);

/// Connector state change surfaced by the link driver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum LinkEvent {
    Connected,
    Disconnected,
}

/// One framed packet as it travels over a connector.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LinkFrame {
    pub content_type: u16,
    pub payload: Bytes,
}

/// Per-connector sending handle, handed to the protocol engines.
///
/// All connectors of one module share the driver's egress channel; the
/// handle tags each frame with its connector so the driver can push it out
/// of the right one. A closed channel means the driver is gone and the
/// send is reported as a transient link error.
#[derive(Clone, Debug)]
pub struct LinkTx {
    connector: ConnectorId,
    tx: UnboundedSender<(ConnectorId, LinkFrame)>,
}

#[derive(Debug)]
pub struct LinkSendError;

// ===== impl PhysAddr =====

impl PhysAddr {
    // Registry policy: every byte of the physical address carries the
    // module id.
    pub fn from_module_id(id: u8) -> PhysAddr {
        PhysAddr([id; 6])
    }
}

// ===== impl LinkTx =====

impl LinkTx {
    pub fn new(
        connector: ConnectorId,
        tx: UnboundedSender<(ConnectorId, LinkFrame)>,
    ) -> LinkTx {
        LinkTx { connector, tx }
    }

    pub fn connector(&self) -> ConnectorId {
        self.connector
    }

    pub fn send(
        &self,
        content_type: u16,
        payload: Bytes,
    ) -> Result<(), LinkSendError> {
        self.tx
            .send((
                self.connector,
                LinkFrame {
                    content_type,
                    payload,
                },
            ))
            .map_err(|_| LinkSendError)
    }
}

// ===== impl LinkSendError =====

impl std::fmt::Display for LinkSendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "link driver is gone")
    }
}

impl std::error::Error for LinkSendError {}
