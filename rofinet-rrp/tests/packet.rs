//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use std::str::FromStr;
use std::sync::LazyLock as Lazy;

use ipnetwork::Ipv6Network;
use rofinet_rrp::packet::{
    Command, DecodeError, DecodeResult, Pdu, RouteEntry,
};

//
// Helper functions.
//

fn test_encode_pdu(bytes_expected: &[u8], pdu: &DecodeResult<Pdu>) {
    let bytes_actual = pdu.as_ref().unwrap().encode();
    assert_eq!(bytes_expected, bytes_actual);
}

fn test_decode_pdu(bytes: &[u8], pdu_expected: &DecodeResult<Pdu>) {
    let pdu_actual = Pdu::decode(bytes);
    assert_eq!(*pdu_expected, pdu_actual);
}

//
// Test PDUs.
//

static CALL1: Lazy<(Vec<u8>, DecodeResult<Pdu>)> = Lazy::new(|| {
    (
        vec![
            0x00, 0x01, 0xfc, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x50, 0x01,
            0x00, 0x00, 0x00,
        ],
        Ok(Pdu {
            command: Command::Call,
            entries: vec![RouteEntry {
                prefix: Ipv6Network::from_str("fc07::1:0:0:1/80").unwrap(),
                cost: 1,
            }],
        }),
    )
});

static RESPONSE1: Lazy<(Vec<u8>, DecodeResult<Pdu>)> = Lazy::new(|| {
    (
        vec![
            0x01, 0x02, 0xfc, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x50, 0x01,
            0x00, 0x00, 0x00, 0xfc, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x50,
            0x02, 0x00, 0x00, 0x00,
        ],
        Ok(Pdu {
            command: Command::Response,
            entries: vec![
                RouteEntry {
                    prefix: Ipv6Network::from_str("fc07::1:0:0:1/80")
                        .unwrap(),
                    cost: 1,
                },
                RouteEntry {
                    prefix: Ipv6Network::from_str("fc07::2:0:0:1/80")
                        .unwrap(),
                    cost: 2,
                },
            ],
        }),
    )
});

// A stub advertisement has no body at all.
static STUBBY1: Lazy<(Vec<u8>, DecodeResult<Pdu>)> = Lazy::new(|| {
    (
        vec![0x02, 0x00],
        Ok(Pdu {
            command: Command::Stubby,
            entries: vec![],
        }),
    )
});

static HELLO1: Lazy<(Vec<u8>, DecodeResult<Pdu>)> = Lazy::new(|| {
    (
        vec![
            0x03, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00,
        ],
        Ok(Pdu {
            command: Command::Hello,
            entries: vec![RouteEntry {
                prefix: Ipv6Network::from_str("::/0").unwrap(),
                cost: 0,
            }],
        }),
    )
});

static SYNC1: Lazy<(Vec<u8>, DecodeResult<Pdu>)> = Lazy::new(|| {
    (
        vec![0x05, 0x00],
        Ok(Pdu {
            command: Command::Sync,
            entries: vec![],
        }),
    )
});

static ERROR1: Lazy<(Vec<u8>, DecodeResult<Pdu>)> = Lazy::new(|| {
    (vec![0x06, 0x00], Err(DecodeError::InvalidCommand(6)))
});

// Entry count promises more entries than the buffer holds.
static ERROR2: Lazy<(Vec<u8>, DecodeResult<Pdu>)> = Lazy::new(|| {
    (
        vec![
            0x00, 0x02, 0xfc, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x50, 0x01,
            0x00, 0x00, 0x00,
        ],
        Err(DecodeError::InvalidLength(23)),
    )
});

static ERROR3: Lazy<(Vec<u8>, DecodeResult<Pdu>)> = Lazy::new(|| {
    (
        vec![
            0x01, 0x01, 0xfc, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x81, 0x01,
            0x00, 0x00, 0x00,
        ],
        Err(DecodeError::InvalidPrefixLength(129)),
    )
});

static ERROR4: Lazy<(Vec<u8>, DecodeResult<Pdu>)> = Lazy::new(|| {
    (
        vec![
            0x01, 0x01, 0xff, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1f, 0x80, 0x01,
            0x00, 0x00, 0x00,
        ],
        Err(DecodeError::InvalidPrefix(
            "ff02::1f".parse().unwrap(),
        )),
    )
});

static ERROR5: Lazy<(Vec<u8>, DecodeResult<Pdu>)> =
    Lazy::new(|| (vec![0x00], Err(DecodeError::InvalidLength(1))));

//
// Tests.
//

#[test]
fn test_encode_call1() {
    let (ref bytes, ref pdu) = *CALL1;
    test_encode_pdu(bytes, pdu);
}

#[test]
fn test_decode_call1() {
    let (ref bytes, ref pdu) = *CALL1;
    test_decode_pdu(bytes, pdu);
}

#[test]
fn test_encode_response1() {
    let (ref bytes, ref pdu) = *RESPONSE1;
    test_encode_pdu(bytes, pdu);
}

#[test]
fn test_decode_response1() {
    let (ref bytes, ref pdu) = *RESPONSE1;
    test_decode_pdu(bytes, pdu);
}

#[test]
fn test_encode_stubby1() {
    let (ref bytes, ref pdu) = *STUBBY1;
    test_encode_pdu(bytes, pdu);
}

#[test]
fn test_decode_stubby1() {
    let (ref bytes, ref pdu) = *STUBBY1;
    test_decode_pdu(bytes, pdu);
}

#[test]
fn test_encode_hello1() {
    let (ref bytes, ref pdu) = *HELLO1;
    test_encode_pdu(bytes, pdu);
}

#[test]
fn test_decode_hello1() {
    let (ref bytes, ref pdu) = *HELLO1;
    test_decode_pdu(bytes, pdu);
}

#[test]
fn test_encode_sync1() {
    let (ref bytes, ref pdu) = *SYNC1;
    test_encode_pdu(bytes, pdu);
}

#[test]
fn test_decode_sync1() {
    let (ref bytes, ref pdu) = *SYNC1;
    test_decode_pdu(bytes, pdu);
}

#[test]
fn test_decode_error1() {
    let (ref bytes, ref pdu) = *ERROR1;
    test_decode_pdu(bytes, pdu);
}

#[test]
fn test_decode_error2() {
    let (ref bytes, ref pdu) = *ERROR2;
    test_decode_pdu(bytes, pdu);
}

#[test]
fn test_decode_error3() {
    let (ref bytes, ref pdu) = *ERROR3;
    test_decode_pdu(bytes, pdu);
}

#[test]
fn test_decode_error4() {
    let (ref bytes, ref pdu) = *ERROR4;
    test_decode_pdu(bytes, pdu);
}

#[test]
fn test_decode_error5() {
    let (ref bytes, ref pdu) = *ERROR5;
    test_decode_pdu(bytes, pdu);
}
