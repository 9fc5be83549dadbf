//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Instant;

use rofinet_utils::partition::{
    Partition, PartitionError, UpdatePartition,
};

use crate::debug::Debug;
use crate::packet::{
    ChunkDescriptor, ChunkId, FwSize, FwType, FwVersion, Proto, chunk_len,
};

/// Identity and size of one firmware image.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Firmware {
    pub fw_type: FwType,
    pub version: FwVersion,
    pub size: FwSize,
}

/// A higher-version image being fetched chunk by chunk.
///
/// Owns the writable partition handle for as long as it exists; dropping
/// the update is what releases the slot.
#[derive(Debug)]
pub struct OngoingUpdate {
    pub fw_type: FwType,
    pub fw_version: FwVersion,
    pub proto: Proto,
    pub last_progress: Instant,
    present: Vec<bool>,
    partition: Box<dyn UpdatePartition>,
}

// ===== impl OngoingUpdate =====

impl OngoingUpdate {
    pub(crate) fn new(
        proto: Proto,
        dsc: &ChunkDescriptor,
        partition: Box<dyn UpdatePartition>,
    ) -> OngoingUpdate {
        Debug::UpdateStart(dsc.fw_version, proto.chunks).log();

        OngoingUpdate {
            fw_type: dsc.fw_type,
            fw_version: dsc.fw_version,
            proto,
            last_progress: Instant::now(),
            present: vec![false; proto.chunks as usize],
            partition,
        }
    }

    pub fn is_chunk_present(&self, chunk_id: ChunkId) -> bool {
        self.present.get(chunk_id as usize).copied().unwrap_or(false)
    }

    pub fn is_complete(&self) -> bool {
        self.present.iter().all(|present| *present)
    }

    pub(crate) fn mark_progress(&mut self) {
        self.last_progress = Instant::now();
    }

    /// Writes one chunk and marks it present.
    pub(crate) fn write_chunk(
        &mut self,
        chunk_id: ChunkId,
        data: &[u8],
    ) -> Result<(), PartitionError> {
        let offset = chunk_id as u32 * self.proto.chunk_size as u32;
        self.partition.write(offset, data)?;
        self.present[chunk_id as usize] = true;
        Debug::ChunkWritten(&ChunkDescriptor {
            fw_type: self.fw_type,
            fw_version: self.fw_version,
            chunk_id,
        })
        .log();
        Ok(())
    }

    /// Reads one present chunk back from the update slot.
    pub(crate) fn read_chunk(
        &self,
        chunk_id: ChunkId,
        buf: &mut [u8],
    ) -> Result<(), PartitionError> {
        let offset = chunk_id as u32 * self.proto.chunk_size as u32;
        self.partition.read(offset, buf)
    }

    /// Makes the fetched image the next boot image.
    pub(crate) fn commit(&mut self) -> Result<(), PartitionError> {
        self.partition.commit()?;
        Debug::UpdateCommit(self.fw_version).log();
        Ok(())
    }

    /// First chunk present after the given one, if any.
    pub fn next_present_chunk(&self, after: ChunkId) -> Option<ChunkId> {
        self.present
            .iter()
            .enumerate()
            .skip(after as usize + 1)
            .find(|(_, present)| **present)
            .map(|(chunk_id, _)| chunk_id as ChunkId)
    }

    /// First chunk still missing, if any.
    pub fn first_missing_chunk(&self) -> Option<ChunkId> {
        self.present
            .iter()
            .position(|present| !present)
            .map(|chunk_id| chunk_id as ChunkId)
    }

    /// Length one chunk of this image actually occupies.
    pub(crate) fn chunk_len(&self, chunk_id: ChunkId) -> usize {
        chunk_len(self.proto.fw_size, chunk_id, self.proto.chunk_size)
    }

    // Releases the partition handle back to the caller.
    pub(crate) fn into_partition(self) -> Box<dyn UpdatePartition> {
        self.partition
    }
}

// ===== tests =====
