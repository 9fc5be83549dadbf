//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use rofinet_utils::link::ConnectorId;
use tracing::{debug, debug_span};

use crate::packet::{
    ChunkDescriptor, ChunkId, ChunkSize, FwVersion, Message,
};

// FDP debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    MessageRx(ConnectorId, &'a Message),
    MessageTx(ConnectorId, &'a Message),
    ChunkSizeMismatch(ChunkSize),
    UpdateStart(FwVersion, ChunkId),
    ChunkWritten(&'a ChunkDescriptor),
    UpdateCommit(FwVersion),
    UpdateAbandon(FwVersion),
    AnnounceRunning(FwVersion),
    ProgressRequest(ChunkId),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::MessageRx(connector, msg) => {
                // Parent span(s): rofi-module
                debug_span!("firmware").in_scope(|| {
                    debug_span!("input", %connector).in_scope(|| {
                        let data = serde_json::to_string(&msg).unwrap();
                        debug!(%data, "{}", self);
                    });
                });
            }
            Debug::MessageTx(connector, msg) => {
                // Parent span(s): rofi-module
                debug_span!("firmware").in_scope(|| {
                    debug_span!("output", %connector).in_scope(|| {
                        let data = serde_json::to_string(&msg).unwrap();
                        debug!(%data, "{}", self);
                    });
                });
            }
            Debug::ChunkSizeMismatch(chunk_size) => {
                // Parent span(s): rofi-module
                debug!(%chunk_size, "{}", self);
            }
            Debug::UpdateStart(version, chunks) => {
                // Parent span(s): rofi-module
                debug!(%version, %chunks, "{}", self);
            }
            Debug::ChunkWritten(dsc) => {
                // Parent span(s): rofi-module
                debug!(version = %dsc.fw_version, chunk = %dsc.chunk_id,
                    "{}", self);
            }
            Debug::UpdateCommit(version)
            | Debug::UpdateAbandon(version)
            | Debug::AnnounceRunning(version) => {
                // Parent span(s): rofi-module
                debug!(%version, "{}", self);
            }
            Debug::ProgressRequest(chunk) => {
                // Parent span(s): rofi-module
                debug!(%chunk, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::MessageRx(..) | Debug::MessageTx(..) => {
                write!(f, "message")
            }
            Debug::ChunkSizeMismatch(..) => {
                write!(f, "discarding message with foreign chunk size")
            }
            Debug::UpdateStart(..) => {
                write!(f, "update started")
            }
            Debug::ChunkWritten(..) => {
                write!(f, "chunk written")
            }
            Debug::UpdateCommit(..) => {
                write!(f, "update committed")
            }
            Debug::UpdateAbandon(..) => {
                write!(f, "update abandoned")
            }
            Debug::AnnounceRunning(..) => {
                write!(f, "announcing running firmware")
            }
            Debug::ProgressRequest(..) => {
                write!(f, "re-requesting stalled chunk")
            }
        }
    }
}
