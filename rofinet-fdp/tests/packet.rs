//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::LazyLock as Lazy;

use bytes::Bytes;
use rofinet_fdp::packet::{
    AnnounceMsg, ChunkDescriptor, DataMsg, DecodeError, DecodeResult,
    Message, Proto, RequestMsg,
};

//
// Helper functions.
//

fn test_encode_msg(bytes_expected: &[u8], msg: &DecodeResult<Message>) {
    let bytes_actual = msg.as_ref().unwrap().encode();
    assert_eq!(bytes_expected, bytes_actual);
}

fn test_decode_msg(bytes: &[u8], msg_expected: &DecodeResult<Message>) {
    // The receive side stamps the connector the frame arrived on.
    let msg_actual = Message::decode(bytes, 3);
    assert_eq!(*msg_expected, msg_actual);
}

//
// Test messages.
//

static ANNOUNCE1: Lazy<(Vec<u8>, DecodeResult<Message>)> = Lazy::new(|| {
    (
        vec![
            0x00, 0x00, 0x04, 0x04, 0x00, 0x00, 0x10, 0x00, 0x00, 0x01,
            0x06, 0x00, 0x02, 0x00,
        ],
        Ok(Message::Announce(AnnounceMsg {
            proto: Proto {
                connector_id: 3,
                chunk_size: 1024,
                chunks: 4,
                fw_size: 4096,
            },
            dsc: ChunkDescriptor {
                fw_type: 1,
                fw_version: 6,
                chunk_id: 2,
            },
        })),
    )
});

static REQUEST1: Lazy<(Vec<u8>, DecodeResult<Message>)> = Lazy::new(|| {
    (
        vec![
            0x01, 0x00, 0x04, 0x04, 0x00, 0x00, 0x10, 0x00, 0x00, 0x01,
            0x06, 0x00, 0x00, 0x00,
        ],
        Ok(Message::Request(RequestMsg {
            proto: Proto {
                connector_id: 3,
                chunk_size: 1024,
                chunks: 4,
                fw_size: 4096,
            },
            dsc: ChunkDescriptor {
                fw_type: 1,
                fw_version: 6,
                chunk_id: 0,
            },
        })),
    )
});

static DATA1: Lazy<(Vec<u8>, DecodeResult<Message>)> = Lazy::new(|| {
    (
        vec![
            0x02, 0x04, 0x00, 0x02, 0x00, 0x06, 0x00, 0x00, 0x00, 0x01,
            0x06, 0x00, 0x01, 0x00, 0xde, 0xad,
        ],
        Ok(Message::Data(DataMsg {
            proto: Proto {
                connector_id: 3,
                chunk_size: 4,
                chunks: 2,
                fw_size: 6,
            },
            dsc: ChunkDescriptor {
                fw_type: 1,
                fw_version: 6,
                chunk_id: 1,
            },
            data: Bytes::from_static(&[0xde, 0xad]),
        })),
    )
});

static ERROR1: Lazy<(Vec<u8>, DecodeResult<Message>)> = Lazy::new(|| {
    (
        vec![
            0x03, 0x00, 0x04, 0x04, 0x00, 0x00, 0x10, 0x00, 0x00, 0x01,
            0x06, 0x00, 0x02, 0x00,
        ],
        Err(DecodeError::InvalidMessageType(3)),
    )
});

static ERROR2: Lazy<(Vec<u8>, DecodeResult<Message>)> = Lazy::new(|| {
    (
        vec![0x00, 0x00, 0x04],
        Err(DecodeError::InvalidLength(3)),
    )
});

//
// Tests.
//

#[test]
fn test_encode_announce1() {
    let (ref bytes, ref msg) = *ANNOUNCE1;
    test_encode_msg(bytes, msg);
}

#[test]
fn test_decode_announce1() {
    let (ref bytes, ref msg) = *ANNOUNCE1;
    test_decode_msg(bytes, msg);
}

#[test]
fn test_encode_request1() {
    let (ref bytes, ref msg) = *REQUEST1;
    test_encode_msg(bytes, msg);
}

#[test]
fn test_decode_request1() {
    let (ref bytes, ref msg) = *REQUEST1;
    test_decode_msg(bytes, msg);
}

#[test]
fn test_encode_data1() {
    let (ref bytes, ref msg) = *DATA1;
    test_encode_msg(bytes, msg);
}

#[test]
fn test_decode_data1() {
    let (ref bytes, ref msg) = *DATA1;
    test_decode_msg(bytes, msg);
}

#[test]
fn test_decode_error1() {
    let (ref bytes, ref msg) = *ERROR1;
    test_decode_msg(bytes, msg);
}

#[test]
fn test_decode_error2() {
    let (ref bytes, ref msg) = *ERROR2;
    test_decode_msg(bytes, msg);
}
