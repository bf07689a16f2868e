// =============================================================================
// Eventide Matrix Homeserver - Error Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Global error type for the ingestion core. Storage and federation
//   failures are transient and surfaced unchanged so that callers can
//   retry; malformed events and unsupported room versions are fatal to
//   the call. Authorization rejections are deliberately NOT represented
//   here - they are a terminal classification carried as a value (see
//   `service::rooms::event_auth::RejectionReason`), not an error to
//   propagate with `?`.
//
// =============================================================================

use std::io;

use ruma::{OwnedEventId, OwnedRoomId, OwnedServerName, RoomVersionId};
use thiserror::Error;
use tracing::error;

/// Eventide global error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Federation error: {0}")]
    Federation(String),

    /// The auth chain returned by a remote server was incomplete: after
    /// consulting both the fetched events and the store, some auth
    /// ancestors of the named event are still unknown.
    #[error("Missing auth event NIDs for event {0}")]
    MissingAuthEvents(OwnedEventId),

    #[error("Room {0} is not known to this server")]
    UnknownRoom(OwnedRoomId),

    #[error("Unsupported room version: {0}")]
    UnsupportedRoomVersion(RoomVersionId),

    /// Unparseable or structurally invalid event payloads.
    #[error("Bad event: {0}")]
    BadEvent(String),

    #[error("Redaction failed for event from {0}: {1}")]
    Redaction(OwnedServerName, String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Storage-layer invariant breakage. Logged at error level at the
    /// point of construction so the database context is not lost.
    pub fn bad_database(message: impl Into<String>) -> Self {
        let message = message.into();
        error!("❌ Bad database: {}", message);
        Error::Database(message)
    }
}

/// Eventide global result type
pub type Result<T> = std::result::Result<T, Error>;
