//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use bytes::Bytes;
use rofinet_fdp::engine::{Config, UpdateProtocol};
use rofinet_fdp::packet::{
    AnnounceMsg, ChunkDescriptor, DataMsg, FwVersion, Message, Proto,
    RequestMsg, chunk_len, size_to_chunks,
};
use rofinet_fdp::update::Firmware;
use rofinet_utils::link::{
    CONTENT_TYPE_FDP, ConnectorId, LinkFrame, LinkTx,
};
use rofinet_utils::partition::MemPartition;
use tokio::sync::mpsc::UnboundedReceiver;

const FW_TYPE: u8 = 1;
const CHUNK_SIZE: u16 = 1024;

struct Harness {
    engine: UpdateProtocol,
    egress: UnboundedReceiver<(ConnectorId, LinkFrame)>,
    update_slot: MemPartition,
}

impl Harness {
    fn new(
        connectors: usize,
        version: FwVersion,
        image: Vec<u8>,
    ) -> Harness {
        let mut config = Config::default();
        config.chunk_size = CHUNK_SIZE;
        config.progress_check_period = Duration::from_millis(0);

        let running = Firmware {
            fw_type: FW_TYPE,
            version,
            size: image.len() as u32,
        };
        let running_partition = MemPartition::with_image(image);
        let update_slot = MemPartition::empty(64 * 1024);

        let (tx, egress) = tokio::sync::mpsc::unbounded_channel();
        let links = (0..connectors as ConnectorId)
            .map(|connector| LinkTx::new(connector, tx.clone()))
            .collect();

        Harness {
            engine: UpdateProtocol::new(
                config,
                running,
                Box::new(running_partition),
                Box::new(update_slot.clone()),
                links,
            ),
            egress,
            update_slot,
        }
    }

    // Drains and decodes everything the engine pushed to the links.
    fn sent(&mut self) -> Vec<(ConnectorId, Message)> {
        let mut msgs = vec![];
        while let Ok((connector, frame)) = self.egress.try_recv() {
            assert_eq!(frame.content_type, CONTENT_TYPE_FDP);
            let msg = Message::decode(&frame.payload, connector).unwrap();
            msgs.push((connector, msg));
        }
        msgs
    }
}

fn image(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

fn proto_for(fw_size: u32, connector_id: ConnectorId) -> Proto {
    Proto {
        connector_id,
        chunk_size: CHUNK_SIZE,
        chunks: size_to_chunks(fw_size, CHUNK_SIZE),
        fw_size,
    }
}

fn dsc(version: FwVersion, chunk_id: u16) -> ChunkDescriptor {
    ChunkDescriptor {
        fw_type: FW_TYPE,
        fw_version: version,
        chunk_id,
    }
}

fn announce(
    version: FwVersion,
    chunk_id: u16,
    fw_size: u32,
    from: ConnectorId,
) -> Message {
    Message::Announce(AnnounceMsg {
        proto: proto_for(fw_size, from),
        dsc: dsc(version, chunk_id),
    })
}

fn request(
    version: FwVersion,
    chunk_id: u16,
    fw_size: u32,
    from: ConnectorId,
) -> Message {
    Message::Request(RequestMsg {
        proto: proto_for(fw_size, from),
        dsc: dsc(version, chunk_id),
    })
}

fn data(
    version: FwVersion,
    chunk_id: u16,
    image: &[u8],
    from: ConnectorId,
) -> Message {
    let fw_size = image.len() as u32;
    let offset = chunk_id as usize * CHUNK_SIZE as usize;
    let len = chunk_len(fw_size, chunk_id, CHUNK_SIZE);
    Message::Data(DataMsg {
        proto: proto_for(fw_size, from),
        dsc: dsc(version, chunk_id),
        data: Bytes::copy_from_slice(&image[offset..offset + len]),
    })
}

// An announce of an older firmware changes nothing and sends nothing.
#[test]
fn test_stale_announce_is_ignored() {
    let mut harness = Harness::new(2, 5, image(4096));

    harness
        .engine
        .process_message(announce(4, 0, 4096, 0), 100);

    assert!(!harness.engine.updating());
    assert!(harness.sent().is_empty());
}

#[test]
fn test_new_announce_starts_update() {
    let mut harness = Harness::new(2, 5, image(4096));

    harness
        .engine
        .process_message(announce(6, 0, 8192, 0), 100);

    assert!(harness.engine.updating());
    let sent = harness.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], (0, request(6, 0, 8192, 0)));

    // The same chunk announced again piggy-backs on the in-flight
    // request instead of asking twice.
    harness
        .engine
        .process_message(announce(6, 0, 8192, 1), 105);
    assert!(harness.sent().is_empty());
}

#[test]
fn test_request_served_from_running_image() {
    let img = image(4096);
    let mut harness = Harness::new(2, 5, img.clone());

    harness.engine.process_message(request(5, 1, 4096, 1), 100);

    let sent = harness.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], (1, data(5, 1, &img, 1)));
    // The next chunk is proactively announced to the requester.
    assert_eq!(sent[1].0, 1);
    assert_eq!(*sent[1].1.dsc(), dsc(5, 2));

    // The last chunk has no successor to announce.
    harness.engine.process_message(request(5, 3, 4096, 1), 100);
    let sent = harness.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], (1, data(5, 3, &img, 1)));

    // Out-of-range chunk ids are rejected outright.
    harness.engine.process_message(request(5, 4, 4096, 1), 100);
    assert!(harness.sent().is_empty());
}

#[test]
fn test_update_happy_path() {
    let new_image = image(4096);
    let mut harness = Harness::new(2, 5, image(2048));

    harness
        .engine
        .process_message(announce(6, 0, 4096, 0), 100);
    harness.sent();

    for chunk_id in 0..4 {
        harness
            .engine
            .process_message(data(6, chunk_id, &new_image, 0), 110);

        // Each acquired chunk is announced everywhere except where it
        // came from.
        let sent = harness.sent();
        let announces = sent
            .iter()
            .filter(|(_, msg)| matches!(msg, Message::Announce(_)))
            .collect::<Vec<_>>();
        assert_eq!(announces.len(), 1);
        assert_eq!(announces[0].0, 1);
        assert_eq!(*announces[0].1.dsc(), dsc(6, chunk_id));
    }

    // All chunks present: the update slot was committed, bytes intact.
    let update = harness.engine.ongoing().unwrap();
    assert!(update.is_complete());
    assert!(harness.update_slot.committed());
    assert_eq!(&harness.update_slot.contents()[..4096], &new_image[..]);
}

#[test]
fn test_duplicate_data_is_idempotent() {
    let new_image = image(2048);
    let mut harness = Harness::new(2, 5, image(1024));

    harness
        .engine
        .process_message(announce(6, 0, 2048, 0), 100);
    harness.sent();
    harness
        .engine
        .process_message(data(6, 0, &new_image, 0), 110);
    let slot_after_first = harness.update_slot.contents();
    harness.sent();

    // A replayed chunk neither rewrites nor re-announces.
    harness
        .engine
        .process_message(data(6, 0, &new_image, 0), 111);
    assert!(harness.sent().is_empty());
    assert_eq!(slot_after_first, harness.update_slot.contents());
}

#[test]
fn test_request_forwarded_when_chunk_missing() {
    let mut harness = Harness::new(3, 5, image(1024));

    harness
        .engine
        .process_message(announce(6, 0, 4096, 0), 100);
    harness.sent();

    // A peer asks for a chunk we do not have yet: the request fans out
    // to the other connectors and our own interest rides along.
    harness.engine.process_message(request(6, 2, 4096, 1), 105);
    let sent = harness.sent();
    let targets = sent
        .iter()
        .map(|(connector, msg)| {
            assert!(matches!(msg, Message::Request(_)));
            *connector
        })
        .collect::<Vec<_>>();
    assert_eq!(targets, vec![0, 2]);

    // Once the data arrives, the waiting peer is served.
    let new_image = image(4096);
    harness
        .engine
        .process_message(data(6, 2, &new_image, 0), 110);
    let sent = harness.sent();
    let forwarded = sent
        .iter()
        .filter(|(_, msg)| matches!(msg, Message::Data(_)))
        .collect::<Vec<_>>();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].0, 1);
}

// Announces for a firmware type this module does not run are flooded
// once and deduplicated afterwards.
#[test]
fn test_foreign_type_announce_forwarded_once() {
    let mut harness = Harness::new(3, 5, image(1024));

    let foreign = Message::Announce(AnnounceMsg {
        proto: proto_for(4096, 0),
        dsc: ChunkDescriptor {
            fw_type: 9,
            fw_version: 1,
            chunk_id: 0,
        },
    });

    harness.engine.process_message(foreign.clone(), 100);
    let sent = harness.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|(connector, _)| *connector != 0));

    // Within the seen window the same announce is dropped.
    harness.engine.process_message(foreign, 105);
    assert!(harness.sent().is_empty());
    assert!(!harness.engine.updating());
}

#[test]
fn test_chunk_size_mismatch_discards() {
    let mut harness = Harness::new(2, 5, image(1024));

    let mut msg = announce(6, 0, 4096, 0);
    match &mut msg {
        Message::Announce(msg) => msg.proto.chunk_size = 512,
        _ => unreachable!(),
    }
    // 512-byte geometry needs a consistent chunk count too.
    match &mut msg {
        Message::Announce(msg) => msg.proto.chunks = 8,
        _ => unreachable!(),
    }

    harness.engine.process_message(msg, 100);
    assert!(!harness.engine.updating());
    assert!(harness.sent().is_empty());
}
