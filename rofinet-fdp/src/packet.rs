//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;
use rofinet_utils::bytes::TLS_BUF;
use rofinet_utils::link::{CONNECTOR_SELF, ConnectorId};
use serde::{Deserialize, Serialize};

// Firmware identification and sizing.
pub type FwType = u8;
pub type FwVersion = u16;
pub type ChunkId = u16;
pub type ChunkSize = u16;
pub type FwSize = u32;

//
// The FDP frame format is:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |   type (1)    |        chunk size (2, LE)     |  chunks (2,   |
// +---------------+-------------------------------+---------------+
// |      LE)      |             firmware size (4, LE)             |
// +---------------+---------------+-------------------------------+
// |      ...      |  fw type (1)  |      fw version (2, LE)       |
// +---------------+---------------+-------------------------------+
// |        chunk id (2, LE)       |  chunk bytes (Data only) ...
// +-------------------------------+-------------------------------+
//
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Message {
    Announce(AnnounceMsg),
    Request(RequestMsg),
    Data(DataMsg),
}

#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum MessageType {
    Announce = 0,
    Request = 1,
    Data = 2,
}

/// Protocol parameters carried in every message so listeners can size
/// their buffers without a prior handshake.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Proto {
    // Connector the message arrived on; filled at receive time, never
    // serialized.
    #[serde(skip)]
    pub connector_id: ConnectorId,
    pub chunk_size: ChunkSize,
    pub chunks: ChunkId,
    pub fw_size: FwSize,
}

/// Uniquely names one chunk of one firmware image.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct ChunkDescriptor {
    pub fw_type: FwType,
    pub fw_version: FwVersion,
    pub chunk_id: ChunkId,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AnnounceMsg {
    pub proto: Proto,
    pub dsc: ChunkDescriptor,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RequestMsg {
    pub proto: Proto,
    pub dsc: ChunkDescriptor,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DataMsg {
    pub proto: Proto,
    pub dsc: ChunkDescriptor,
    pub data: Bytes,
}

// FDP decode errors.
#[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum DecodeError {
    InvalidLength(usize),
    InvalidMessageType(u8),
}

// Type aliases.
pub type DecodeResult<T> = Result<T, DecodeError>;

// ===== impl Message =====

impl Message {
    pub const HDR_LENGTH: usize = 14;

    pub fn msg_type(&self) -> MessageType {
        match self {
            Message::Announce(_) => MessageType::Announce,
            Message::Request(_) => MessageType::Request,
            Message::Data(_) => MessageType::Data,
        }
    }

    pub fn proto(&self) -> &Proto {
        match self {
            Message::Announce(msg) => &msg.proto,
            Message::Request(msg) => &msg.proto,
            Message::Data(msg) => &msg.proto,
        }
    }

    pub fn dsc(&self) -> &ChunkDescriptor {
        match self {
            Message::Announce(msg) => &msg.dsc,
            Message::Request(msg) => &msg.dsc,
            Message::Data(msg) => &msg.dsc,
        }
    }

    pub fn encode(&self) -> BytesMut {
        TLS_BUF.with(|buf| {
            let mut buf = buf.borrow_mut();
            buf.clear();

            let proto = self.proto();
            let dsc = self.dsc();
            buf.put_u8(self.msg_type() as u8);
            buf.put_u16_le(proto.chunk_size);
            buf.put_u16_le(proto.chunks);
            buf.put_u32_le(proto.fw_size);
            buf.put_u8(dsc.fw_type);
            buf.put_u16_le(dsc.fw_version);
            buf.put_u16_le(dsc.chunk_id);
            if let Message::Data(msg) = self {
                buf.put_slice(&msg.data);
            }

            buf.clone()
        })
    }

    pub fn decode(
        data: &[u8],
        connector_id: ConnectorId,
    ) -> DecodeResult<Message> {
        let mut buf = Bytes::copy_from_slice(data);

        // Validate the frame length.
        let buf_size = data.len();
        if buf_size < Self::HDR_LENGTH {
            return Err(DecodeError::InvalidLength(buf_size));
        }

        // Parse and validate the message type.
        let msg_type = buf.get_u8();
        let msg_type = MessageType::from_u8(msg_type)
            .ok_or(DecodeError::InvalidMessageType(msg_type))?;

        let proto = Proto {
            connector_id,
            chunk_size: buf.get_u16_le(),
            chunks: buf.get_u16_le(),
            fw_size: buf.get_u32_le(),
        };
        let dsc = ChunkDescriptor {
            fw_type: buf.get_u8(),
            fw_version: buf.get_u16_le(),
            chunk_id: buf.get_u16_le(),
        };

        let msg = match msg_type {
            MessageType::Announce => {
                Message::Announce(AnnounceMsg { proto, dsc })
            }
            MessageType::Request => {
                Message::Request(RequestMsg { proto, dsc })
            }
            MessageType::Data => Message::Data(DataMsg {
                proto,
                dsc,
                data: buf,
            }),
        };

        Ok(msg)
    }
}

// ===== impl Proto =====

impl Proto {
    /// Parameters under which this module offers the given image.
    pub fn for_image(chunk_size: ChunkSize, fw_size: FwSize) -> Proto {
        Proto {
            connector_id: CONNECTOR_SELF,
            chunk_size,
            chunks: size_to_chunks(fw_size, chunk_size),
            fw_size,
        }
    }
}

// ===== impl DecodeError =====

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::InvalidLength(length) => {
                write!(f, "Invalid length: {length}")
            }
            DecodeError::InvalidMessageType(msg_type) => {
                write!(f, "Invalid FDP message type: {msg_type}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

// ===== global functions =====

/// Number of chunks an image of the given size splits into.
pub fn size_to_chunks(size: FwSize, chunk_size: ChunkSize) -> ChunkId {
    size.div_ceil(chunk_size as FwSize) as ChunkId
}

/// Length of one chunk: the tail chunk covers only what is left of the
/// image.
pub fn chunk_len(
    size: FwSize,
    chunk_id: ChunkId,
    chunk_size: ChunkSize,
) -> usize {
    let offset = chunk_id as FwSize * chunk_size as FwSize;
    (size - offset).min(chunk_size as FwSize) as usize
}

/// Whether the chunk id falls within an image of the given size.
pub fn is_valid_chunk(
    size: FwSize,
    chunk_id: ChunkId,
    chunk_size: ChunkSize,
) -> bool {
    chunk_id < size_to_chunks(size, chunk_size)
}

// ===== tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_to_chunks() {
        assert_eq!(size_to_chunks(4096, 1024), 4);
        assert_eq!(size_to_chunks(4097, 1024), 5);
        assert_eq!(size_to_chunks(1, 1024), 1);
        assert_eq!(size_to_chunks(0, 1024), 0);
    }

    #[test]
    fn test_chunk_boundaries() {
        // The last chunk of a 4 KiB image is id 3; one higher is invalid.
        assert!(is_valid_chunk(4096, 3, 1024));
        assert!(!is_valid_chunk(4096, 4, 1024));

        // A ragged tail shortens the last chunk only.
        assert_eq!(chunk_len(4097, 3, 1024), 1024);
        assert_eq!(chunk_len(4097, 4, 1024), 1);
        assert_eq!(chunk_len(4096, 3, 1024), 1024);
    }
}
