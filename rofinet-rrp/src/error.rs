//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{error, warn};

use crate::packet::DecodeError;

// RRP errors.
#[derive(Debug)]
pub enum Error {
    PduDecodeError(DecodeError),
    LinkSendError(String),
    InterfaceNotFound(i8),
    InvariantViolation(&'static str),
}

// ===== impl Error =====

impl Error {
    pub(crate) fn log(&self) {
        match self {
            Error::PduDecodeError(error) => {
                warn!(%error, "{}", self);
            }
            Error::LinkSendError(interface) => {
                warn!(%interface, "{}", self);
            }
            Error::InterfaceNotFound(connector) => {
                warn!(%connector, "{}", self);
            }
            Error::InvariantViolation(reason) => {
                error!(%reason, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::PduDecodeError(..) => {
                write!(f, "failed to decode PDU")
            }
            Error::LinkSendError(..) => {
                write!(f, "failed to send PDU")
            }
            Error::InterfaceNotFound(..) => {
                write!(f, "no interface for connector")
            }
            Error::InvariantViolation(..) => {
                write!(f, "routing table invariant violated")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::PduDecodeError(error) => Some(error),
            _ => None,
        }
    }
}
