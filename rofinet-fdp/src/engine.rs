//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use rand::Rng;
use rofinet_utils::link::{
    CONNECTOR_SELF, CONTENT_TYPE_FDP, ConnectorId, LinkTx,
};
use rofinet_utils::partition::{Partition, UpdatePartition};

use crate::debug::Debug;
use crate::error::Error;
use crate::packet::{
    AnnounceMsg, ChunkDescriptor, ChunkSize, DataMsg, Message, MessageType,
    Proto, RequestMsg, chunk_len, is_valid_chunk,
};
use crate::store::{RecentlySeenStore, RequestStore, UnixSecs};
use crate::update::{Firmware, OngoingUpdate};

/// Tunables of the dissemination protocol. The defaults are what modules
/// ship with; tests shrink the periods to keep wall-clock time down.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub chunk_size: ChunkSize,
    pub announce_period: Duration,
    pub progress_check_period: Duration,
    pub seen_store_capacity: usize,
    pub in_flight_capacity: usize,
    // Seconds before a peer's silence re-opens an in-flight request.
    pub in_flight_expiry: UnixSecs,
    pub event_queue_depth: usize,
}

/// Per-module firmware dissemination state: what runs, what is being
/// fetched, and who asked for what.
#[derive(Debug)]
pub struct UpdateProtocol {
    config: Config,
    running: Firmware,
    running_partition: Box<dyn Partition>,
    // The writable slot, parked here between updates.
    update_slot: Option<Box<dyn UpdatePartition>>,
    ongoing: Option<OngoingUpdate>,
    announces_seen: RecentlySeenStore,
    datas_seen: RecentlySeenStore,
    in_flight: RequestStore,
    connectors: Vec<LinkTx>,
    pub statistics: MessageStatistics,
}

// Inbound and outbound statistic counters.
#[derive(Debug, Default)]
pub struct MessageStatistics {
    pub discontinuity_time: Option<DateTime<Utc>>,
    pub announces_rcvd: u32,
    pub announces_sent: u32,
    pub requests_rcvd: u32,
    pub requests_sent: u32,
    pub data_rcvd: u32,
    pub data_sent: u32,
}

// ===== impl Config =====

impl Default for Config {
    fn default() -> Config {
        let mut rng = rand::rng();
        Config {
            chunk_size: 1024,
            // Desynchronize the announce cadence across the mesh.
            announce_period: Duration::from_secs(
                rng.random_range(5..=30),
            ),
            progress_check_period: Duration::from_secs(
                rng.random_range(10..=60),
            ),
            seen_store_capacity: 20,
            in_flight_capacity: 20,
            in_flight_expiry: 20,
            event_queue_depth: 8,
        }
    }
}

// ===== impl MessageStatistics =====

impl MessageStatistics {
    pub(crate) fn update(&mut self, msg_type: MessageType, sent: bool) {
        self.discontinuity_time = Some(Utc::now());
        match (msg_type, sent) {
            (MessageType::Announce, false) => self.announces_rcvd += 1,
            (MessageType::Announce, true) => self.announces_sent += 1,
            (MessageType::Request, false) => self.requests_rcvd += 1,
            (MessageType::Request, true) => self.requests_sent += 1,
            (MessageType::Data, false) => self.data_rcvd += 1,
            (MessageType::Data, true) => self.data_sent += 1,
        }
    }
}

// ===== impl UpdateProtocol =====

impl UpdateProtocol {
    pub fn new(
        config: Config,
        running: Firmware,
        running_partition: Box<dyn Partition>,
        update_slot: Box<dyn UpdatePartition>,
        connectors: Vec<LinkTx>,
    ) -> UpdateProtocol {
        UpdateProtocol {
            announces_seen: RecentlySeenStore::new(
                config.in_flight_expiry,
                config.seen_store_capacity,
            ),
            datas_seen: RecentlySeenStore::new(
                config.in_flight_expiry,
                config.seen_store_capacity,
            ),
            in_flight: RequestStore::new(
                config.in_flight_expiry,
                config.in_flight_capacity,
            ),
            config,
            running,
            running_partition,
            update_slot: Some(update_slot),
            ongoing: None,
            connectors,
            statistics: Default::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn running(&self) -> &Firmware {
        &self.running
    }

    pub fn updating(&self) -> bool {
        self.ongoing.is_some()
    }

    pub fn ongoing(&self) -> Option<&OngoingUpdate> {
        self.ongoing.as_ref()
    }

    /// One received FDP message, demultiplexed by the scheduler.
    pub fn process_message(&mut self, msg: Message, now: UnixSecs) {
        // Mismatched chunk sizes make peers incompatible; there is no
        // negotiation.
        if msg.proto().chunk_size != self.config.chunk_size {
            Debug::ChunkSizeMismatch(msg.proto().chunk_size).log();
            return;
        }

        Debug::MessageRx(msg.proto().connector_id, &msg).log();
        self.statistics.update(msg.msg_type(), false);

        match msg {
            Message::Announce(msg) => self.process_announce(msg, now),
            Message::Request(msg) => self.process_request(msg, now),
            Message::Data(msg) => self.process_data(msg, now),
        }
    }

    // ===== message handling =====

    fn process_announce(&mut self, msg: AnnounceMsg, now: UnixSecs) {
        if msg.dsc.fw_type != self.running.fw_type {
            self.process_incompatible_announce(msg, now);
            return;
        }

        // Nothing to learn from the past.
        if msg.dsc.fw_version <= self.running.version {
            return;
        }

        if self.ongoing.is_none() {
            self.start_update(msg.proto, &msg.dsc);
        }
        let Some(update) = &self.ongoing else {
            return;
        };

        // One ongoing update at a time.
        if msg.dsc.fw_version != update.fw_version {
            return;
        }
        if update.is_chunk_present(msg.dsc.chunk_id) {
            return;
        }

        self.request_chunk_from(
            msg.proto.connector_id,
            &msg.dsc,
            &msg.proto,
            now,
        );
        if let Some(update) = &mut self.ongoing {
            update.mark_progress();
        }
    }

    fn process_request(&mut self, msg: RequestMsg, now: UnixSecs) {
        if msg.dsc.fw_type != self.running.fw_type {
            self.process_incompatible_request(msg, now);
            return;
        }

        // Serve from the running image.
        if msg.dsc.fw_version == self.running.version {
            if !is_valid_chunk(
                self.running.size,
                msg.dsc.chunk_id,
                msg.proto.chunk_size,
            ) {
                return;
            }

            self.send_running_chunk(&msg.dsc, msg.proto.connector_id);

            // Nudge the requester along with the following chunk.
            if is_valid_chunk(
                self.running.size,
                msg.dsc.chunk_id + 1,
                msg.proto.chunk_size,
            ) {
                let next = ChunkDescriptor {
                    chunk_id: msg.dsc.chunk_id + 1,
                    ..msg.dsc
                };
                self.send(
                    msg.proto.connector_id,
                    &Message::Announce(AnnounceMsg {
                        proto: self.running_proto(),
                        dsc: next,
                    }),
                );
            }
            return;
        }

        let Some(update) = &self.ongoing else {
            return;
        };
        if msg.dsc.fw_version != update.fw_version {
            return;
        }

        if !update.is_chunk_present(msg.dsc.chunk_id) {
            if !is_valid_chunk(
                update.proto.fw_size,
                msg.dsc.chunk_id,
                msg.proto.chunk_size,
            ) {
                return;
            }

            // We want that chunk too: pass the request on for the peer
            // and piggy-back our own interest on it.
            self.request_chunk_for(
                msg.proto.connector_id,
                &msg.dsc,
                &msg.proto,
                now,
            );
            self.request_chunk_for(
                CONNECTOR_SELF,
                &msg.dsc,
                &msg.proto,
                now,
            );
            return;
        }

        // Serve from the partially fetched image.
        self.send_update_chunk(&msg.dsc, msg.proto.connector_id);
        let next = self.ongoing.as_ref().and_then(|update| {
            update
                .next_present_chunk(msg.dsc.chunk_id)
                .map(|chunk_id| (update.proto, chunk_id))
        });
        if let Some((proto, chunk_id)) = next {
            let dsc = ChunkDescriptor {
                chunk_id,
                ..msg.dsc
            };
            self.send(
                msg.proto.connector_id,
                &Message::Announce(AnnounceMsg { proto, dsc }),
            );
        }
    }

    fn process_data(&mut self, msg: DataMsg, now: UnixSecs) {
        if msg.dsc.fw_type != self.running.fw_type {
            self.process_incompatible_data(msg, now);
            return;
        }

        self.satisfy_foreign_requests(&msg, now);

        let Some(update) = &mut self.ongoing else {
            return;
        };
        if msg.dsc.fw_version != update.fw_version
            || !is_valid_chunk(
                update.proto.fw_size,
                msg.dsc.chunk_id,
                msg.proto.chunk_size,
            )
            || update.is_chunk_present(msg.dsc.chunk_id)
        {
            return;
        }

        // A short or padded payload cannot be the chunk it claims to be.
        if msg.data.len() != update.chunk_len(msg.dsc.chunk_id) {
            return;
        }

        if let Err(error) = update.write_chunk(msg.dsc.chunk_id, &msg.data)
        {
            Error::StorageError(error).log();
            self.abandon_update();
            return;
        }
        update.mark_progress();
        self.in_flight.mark_not_in_flight(&msg.dsc, CONNECTOR_SELF);
        self.announce_chunk(
            &msg.dsc,
            Some(msg.proto.connector_id),
            &msg.proto,
        );

        if let Some(update) = &mut self.ongoing
            && update.is_complete()
        {
            if let Err(error) = update.commit() {
                Error::StorageError(error).log();
                self.abandon_update();
            }
        }
    }

    // ===== incompatible firmware types =====

    // Messages for other firmware types are not interpreted, only passed
    // along so unlike modules can still update through us.

    fn process_incompatible_announce(
        &mut self,
        msg: AnnounceMsg,
        now: UnixSecs,
    ) {
        if self.announces_seen.recently_seen(&msg.dsc, now) {
            return;
        }
        self.announces_seen.mark_recently_seen(&msg.dsc, now);
        self.announce_chunk(
            &msg.dsc,
            Some(msg.proto.connector_id),
            &msg.proto,
        );
    }

    fn process_incompatible_request(
        &mut self,
        msg: RequestMsg,
        now: UnixSecs,
    ) {
        self.request_chunk_for(
            msg.proto.connector_id,
            &msg.dsc,
            &msg.proto,
            now,
        );
    }

    fn process_incompatible_data(&mut self, msg: DataMsg, now: UnixSecs) {
        if self.datas_seen.recently_seen(&msg.dsc, now) {
            return;
        }
        self.datas_seen.mark_recently_seen(&msg.dsc, now);
        self.satisfy_foreign_requests(&msg, now);
    }

    // ===== periodic work =====

    /// Advertises chunk 0 of the running image to every connector.
    pub fn announce_running_firmware(&mut self) {
        Debug::AnnounceRunning(self.running.version).log();

        let msg = Message::Announce(AnnounceMsg {
            proto: self.running_proto(),
            dsc: ChunkDescriptor {
                fw_type: self.running.fw_type,
                fw_version: self.running.version,
                chunk_id: 0,
            },
        });
        self.broadcast(&msg, None);
    }

    /// Re-requests the first missing chunk when the update sat idle for a
    /// whole progress period.
    pub fn check_progress(&mut self, now: UnixSecs) {
        let Some(update) = &self.ongoing else {
            return;
        };
        if update.last_progress.elapsed() < self.config.progress_check_period
        {
            return;
        }
        let Some(chunk_id) = update.first_missing_chunk() else {
            return;
        };

        Debug::ProgressRequest(chunk_id).log();
        let dsc = ChunkDescriptor {
            fw_type: update.fw_type,
            fw_version: update.fw_version,
            chunk_id,
        };
        let proto = update.proto;
        self.request_chunk_for(CONNECTOR_SELF, &dsc, &proto, now);
    }

    // ===== helpers =====

    fn running_proto(&self) -> Proto {
        Proto::for_image(self.config.chunk_size, self.running.size)
    }

    fn start_update(&mut self, proto: Proto, dsc: &ChunkDescriptor) {
        // The advertised geometry must be self-consistent, and the chunk
        // ids of the image must fit the wire's u16.
        let chunks = (proto.fw_size as u64)
            .div_ceil(proto.chunk_size.max(1) as u64);
        if chunks == 0
            || chunks > u16::MAX as u64
            || chunks != proto.chunks as u64
        {
            return;
        }

        let Some(partition) = self.update_slot.take() else {
            return;
        };
        if partition.size() < proto.fw_size {
            Error::UpdateTooLarge(proto.fw_size).log();
            self.update_slot = Some(partition);
            return;
        }

        self.ongoing = Some(OngoingUpdate::new(proto, dsc, partition));
    }

    fn abandon_update(&mut self) {
        if let Some(update) = self.ongoing.take() {
            Debug::UpdateAbandon(update.fw_version).log();
            self.update_slot = Some(update.into_partition());
        }
    }

    // Requests a chunk from the module that just announced it, unless an
    // equivalent request is already in flight.
    fn request_chunk_from(
        &mut self,
        connector_id: ConnectorId,
        dsc: &ChunkDescriptor,
        proto: &Proto,
        now: UnixSecs,
    ) {
        let in_flight = self.in_flight.in_flight_for_anybody(dsc, now);
        self.in_flight.mark_in_flight(dsc, CONNECTOR_SELF, now);

        if !in_flight {
            self.send(
                connector_id,
                &Message::Request(RequestMsg {
                    proto: *proto,
                    dsc: *dsc,
                }),
            );
        }
    }

    // Fans a request out on behalf of the given requester (possibly this
    // module), deduplicated through the in-flight store.
    fn request_chunk_for(
        &mut self,
        requester: ConnectorId,
        dsc: &ChunkDescriptor,
        proto: &Proto,
        now: UnixSecs,
    ) {
        let in_flight = self.in_flight.in_flight_for_anybody(dsc, now);
        self.in_flight.mark_in_flight(dsc, requester, now);

        if !in_flight {
            let msg = Message::Request(RequestMsg {
                proto: *proto,
                dsc: *dsc,
            });
            self.broadcast(&msg, Some(requester));
        }
    }

    // Forwards arrived chunk data to every connector still waiting for
    // it.
    fn satisfy_foreign_requests(&mut self, msg: &DataMsg, now: UnixSecs) {
        let mut requesters = self.in_flight.requesters(&msg.dsc, now);
        requesters.remove(&CONNECTOR_SELF);

        for connector_id in requesters {
            self.in_flight.mark_not_in_flight(&msg.dsc, connector_id);
            self.send(connector_id, &Message::Data(msg.clone()));
        }
    }

    fn announce_chunk(
        &mut self,
        dsc: &ChunkDescriptor,
        exclude: Option<ConnectorId>,
        proto: &Proto,
    ) {
        let msg = Message::Announce(AnnounceMsg {
            proto: *proto,
            dsc: *dsc,
        });
        self.broadcast(&msg, exclude);
    }

    fn send_running_chunk(
        &mut self,
        dsc: &ChunkDescriptor,
        connector_id: ConnectorId,
    ) {
        let len =
            chunk_len(self.running.size, dsc.chunk_id, self.config.chunk_size);
        let mut data = vec![0; len];
        let offset = dsc.chunk_id as u32 * self.config.chunk_size as u32;
        if let Err(error) = self.running_partition.read(offset, &mut data)
        {
            Error::StorageError(error).log();
            return;
        }

        self.send(
            connector_id,
            &Message::Data(DataMsg {
                proto: self.running_proto(),
                dsc: *dsc,
                data: Bytes::from(data),
            }),
        );
    }

    fn send_update_chunk(
        &mut self,
        dsc: &ChunkDescriptor,
        connector_id: ConnectorId,
    ) {
        let Some(update) = &self.ongoing else {
            return;
        };
        let mut data = vec![0; update.chunk_len(dsc.chunk_id)];
        if let Err(error) = update.read_chunk(dsc.chunk_id, &mut data) {
            Error::StorageError(error).log();
            return;
        }
        let proto = update.proto;

        self.send(
            connector_id,
            &Message::Data(DataMsg {
                proto,
                dsc: *dsc,
                data: Bytes::from(data),
            }),
        );
    }

    fn broadcast(&mut self, msg: &Message, exclude: Option<ConnectorId>) {
        let connectors = self
            .connectors
            .iter()
            .map(LinkTx::connector)
            .filter(|connector_id| Some(*connector_id) != exclude)
            .collect::<Vec<_>>();
        for connector_id in connectors {
            self.send(connector_id, msg);
        }
    }

    fn send(&mut self, connector_id: ConnectorId, msg: &Message) {
        let Some(link) = self
            .connectors
            .iter()
            .find(|link| link.connector() == connector_id)
        else {
            return;
        };

        Debug::MessageTx(connector_id, msg).log();
        if link
            .send(CONTENT_TYPE_FDP, msg.encode().freeze())
            .is_err()
        {
            Error::LinkSendError(connector_id).log();
            return;
        }

        self.statistics.update(msg.msg_type(), true);
    }
}
