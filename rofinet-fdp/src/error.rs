//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use rofinet_utils::link::ConnectorId;
use rofinet_utils::partition::PartitionError;
use tracing::warn;

use crate::packet::{DecodeError, FwSize};

// FDP errors.
#[derive(Debug)]
pub enum Error {
    MessageDecodeError(DecodeError),
    LinkSendError(ConnectorId),
    StorageError(PartitionError),
    UpdateTooLarge(FwSize),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::MessageDecodeError(error) => {
                warn!(%error, "{}", self);
            }
            Error::LinkSendError(connector) => {
                warn!(%connector, "{}", self);
            }
            Error::StorageError(error) => {
                warn!(%error, "{}", self);
            }
            Error::UpdateTooLarge(size) => {
                warn!(%size, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MessageDecodeError(..) => {
                write!(f, "failed to decode message")
            }
            Error::LinkSendError(..) => {
                write!(f, "failed to send message")
            }
            Error::StorageError(..) => {
                write!(f, "update partition access failed")
            }
            Error::UpdateTooLarge(..) => {
                write!(f, "advertised image exceeds the update partition")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MessageDecodeError(error) => Some(error),
            Error::StorageError(error) => Some(error),
            _ => None,
        }
    }
}
