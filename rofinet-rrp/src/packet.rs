//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv6Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use derive_new::new;
use ipnetwork::Ipv6Network;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;
use rofinet_utils::bytes::{BytesExt, BytesMutExt, TLS_BUF};
use serde::{Deserialize, Serialize};

use crate::route::Cost;

// All RRP traffic is addressed to this link-scoped multicast group.
pub const RRP_MULTICAST_GROUP: Ipv6Addr =
    Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0x1f);

//
// The RRP payload format is:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |  command (1)  |   count (1)   |                               |
// +---------------+---------------+                               +
// |                                                               |
// ~                       Route entry (21)                        ~
// |                                                               |
// +---------------------------------------------------------------+
//
#[derive(Debug, Deserialize, Eq, new, PartialEq, Serialize)]
pub struct Pdu {
    pub command: Command,
    pub entries: Vec<RouteEntry>,
}

//
// The format of the 21-octet route entry is:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// ~                        IPv6 prefix (16)                       ~
// |                                                               |
// +---------------+-----------------------------------------------+
// | prefix len (1)|          cost (4, little-endian)              |
// +---------------+-----------------------------------------------+
//
#[derive(Clone, Copy, Debug, Deserialize, Eq, new, PartialEq, Serialize)]
pub struct RouteEntry {
    pub prefix: Ipv6Network,
    pub cost: Cost,
}

#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Command {
    Call = 0,
    Response = 1,
    Stubby = 2,
    Hello = 3,
    HelloResponse = 4,
    Sync = 5,
}

// RRP decode errors.
#[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum DecodeError {
    InvalidLength(usize),
    InvalidCommand(u8),
    InvalidPrefix(Ipv6Addr),
    InvalidPrefixLength(u8),
}

// Type aliases.
pub type DecodeResult<T> = Result<T, DecodeError>;

// ===== impl Pdu =====

impl Pdu {
    pub const HDR_LENGTH: usize = 2;

    // An empty table view is a valid payload.
    pub const MIN_SIZE: usize = Self::HDR_LENGTH;

    pub fn encode(&self) -> BytesMut {
        TLS_BUF.with(|buf| {
            let mut buf = buf.borrow_mut();
            buf.clear();

            // Encode PDU header.
            buf.put_u8(self.command as u8);
            buf.put_u8(self.entries.len() as u8);

            // Encode route entries.
            for entry in &self.entries {
                entry.encode(&mut buf);
            }

            buf.clone()
        })
    }

    pub fn decode(data: &[u8]) -> DecodeResult<Pdu> {
        let mut buf = Bytes::copy_from_slice(data);

        // Validate the packet length.
        let buf_size = data.len();
        if buf_size < Self::MIN_SIZE {
            return Err(DecodeError::InvalidLength(buf_size));
        }

        // Parse and validate the RRP command.
        let command = buf.get_u8();
        let command = Command::from_u8(command)
            .ok_or(DecodeError::InvalidCommand(command))?;

        // Parse the entry count and validate the length against it.
        let count = buf.get_u8();
        if buf.remaining() < count as usize * RouteEntry::LENGTH {
            return Err(DecodeError::InvalidLength(buf_size));
        }

        // Decode route entries.
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(RouteEntry::decode(&mut buf)?);
        }

        Ok(Pdu { command, entries })
    }
}

// ===== impl RouteEntry =====

impl RouteEntry {
    pub const LENGTH: usize = 21;

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        buf.put_ipv6(&self.prefix.ip());
        buf.put_u8(self.prefix.prefix());
        buf.put_u32_le(self.cost);
    }

    pub(crate) fn decode(buf: &mut Bytes) -> DecodeResult<RouteEntry> {
        let addr = buf.get_ipv6();
        let plen = buf.get_u8();
        let cost = buf.get_u32_le();

        // Sanity checks.
        if addr.is_multicast() {
            return Err(DecodeError::InvalidPrefix(addr));
        }
        let prefix = Ipv6Network::new(addr, plen)
            .map_err(|_| DecodeError::InvalidPrefixLength(plen))?;

        Ok(RouteEntry { prefix, cost })
    }
}

// ===== impl Command =====

impl Command {
    // Hello, HelloResponse and Sync carry the full routing table; the
    // remaining commands carry the interface-filtered view.
    pub(crate) fn is_hello_family(&self) -> bool {
        matches!(
            self,
            Command::Hello | Command::HelloResponse | Command::Sync
        )
    }
}

// ===== impl DecodeError =====

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::InvalidLength(length) => {
                write!(f, "Invalid length: {length}")
            }
            DecodeError::InvalidCommand(command) => {
                write!(f, "Invalid RRP command: {command}")
            }
            DecodeError::InvalidPrefix(addr) => {
                write!(f, "Invalid entry prefix: {addr}")
            }
            DecodeError::InvalidPrefixLength(plen) => {
                write!(f, "Invalid entry prefix length: {plen}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

// ===== global functions =====

// Returns the destination address of a raw IPv6 packet, if the buffer is
// long enough to contain one.
pub fn ipv6_destination(frame: &[u8]) -> Option<Ipv6Addr> {
    let bytes: [u8; 16] = frame.get(24..40)?.try_into().ok()?;
    Some(Ipv6Addr::from(bytes))
}
