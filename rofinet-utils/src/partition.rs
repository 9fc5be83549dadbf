//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::{Arc, Mutex};

use tracing::warn;

// Flash partition errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PartitionError {
    OutOfBounds,
    ReadError,
    WriteError,
    CommitError,
}

/// Read side of a firmware image slot. The running partition only ever
/// exposes this surface.
pub trait Partition: Send + std::fmt::Debug {
    fn read(
        &self,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<(), PartitionError>;

    fn size(&self) -> u32;
}

/// Writable, committable firmware slot.
///
/// Writes are idempotent per region. `commit` makes the slot the next boot
/// image; it is atomic and, from the core's viewpoint, irreversible.
pub trait UpdatePartition: Partition {
    fn write(&mut self, offset: u32, data: &[u8])
    -> Result<(), PartitionError>;

    fn commit(&mut self) -> Result<(), PartitionError>;
}

/// In-memory partition backing tests and the simulator.
///
/// Cloning yields another handle to the same storage, so a test can keep
/// one handle while the ongoing update owns the other.
#[derive(Clone, Debug)]
pub struct MemPartition(Arc<Mutex<MemPartitionInner>>);

#[derive(Debug)]
struct MemPartitionInner {
    data: Vec<u8>,
    committed: bool,
}

// ===== impl PartitionError =====

impl PartitionError {
    pub fn log(&self) {
        warn!(error = %self, "partition access failed");
    }
}

impl std::fmt::Display for PartitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartitionError::OutOfBounds => {
                write!(f, "access beyond partition bounds")
            }
            PartitionError::ReadError => {
                write!(f, "failed to read partition")
            }
            PartitionError::WriteError => {
                write!(f, "failed to write partition")
            }
            PartitionError::CommitError => {
                write!(f, "failed to commit partition")
            }
        }
    }
}

impl std::error::Error for PartitionError {}

// ===== impl MemPartition =====

impl MemPartition {
    /// Creates an empty (zero-filled) slot of the given size.
    pub fn empty(size: u32) -> MemPartition {
        MemPartition(Arc::new(Mutex::new(MemPartitionInner {
            data: vec![0; size as usize],
            committed: false,
        })))
    }

    /// Creates a slot pre-loaded with a firmware image.
    pub fn with_image(data: Vec<u8>) -> MemPartition {
        MemPartition(Arc::new(Mutex::new(MemPartitionInner {
            data,
            committed: false,
        })))
    }

    pub fn committed(&self) -> bool {
        self.0.lock().unwrap().committed
    }

    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().data.clone()
    }
}

impl Partition for MemPartition {
    fn read(
        &self,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<(), PartitionError> {
        let inner = self.0.lock().unwrap();
        let start = offset as usize;
        let end = start
            .checked_add(buf.len())
            .ok_or(PartitionError::OutOfBounds)?;
        if end > inner.data.len() {
            return Err(PartitionError::OutOfBounds);
        }
        buf.copy_from_slice(&inner.data[start..end]);
        Ok(())
    }

    fn size(&self) -> u32 {
        self.0.lock().unwrap().data.len() as u32
    }
}

impl UpdatePartition for MemPartition {
    fn write(
        &mut self,
        offset: u32,
        data: &[u8],
    ) -> Result<(), PartitionError> {
        let mut inner = self.0.lock().unwrap();
        let start = offset as usize;
        let end = start
            .checked_add(data.len())
            .ok_or(PartitionError::OutOfBounds)?;
        if end > inner.data.len() {
            return Err(PartitionError::OutOfBounds);
        }
        inner.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), PartitionError> {
        self.0.lock().unwrap().committed = true;
        Ok(())
    }
}
