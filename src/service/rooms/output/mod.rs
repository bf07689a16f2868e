// =============================================================================
// Eventide Matrix Homeserver - Output Log Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   The ordered per-room notification log. Entries are written strictly
//   after the store writes they describe are durable; consumers observe
//   them in order and must tolerate at-least-once delivery (a retried
//   ingest may re-emit a redaction entry).
//
// =============================================================================

mod data;

pub use data::Data;
use ruma::{OwnedEventId, OwnedServerName, OwnedTransactionId, RoomId};
use serde::{Deserialize, Serialize};

use crate::{service::pdu::HeaderedPdu, Result};

/// One entry of the per-room output log. Externally tagged on the wire:
/// raw-JSON event bodies cannot survive the content buffering an internal
/// tag would need.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum OutputRoomEvent {
    /// A new forward-edge event was accepted into the room.
    NewRoomEvent {
        event: HeaderedPdu,
        /// State entries the room gained relative to the previous latest
        /// state.
        adds_state_event_ids: Vec<OwnedEventId>,
        /// State entries the room lost relative to the previous latest
        /// state.
        removes_state_event_ids: Vec<OwnedEventId>,
        send_as_server: Option<OwnedServerName>,
        transaction_id: Option<OwnedTransactionId>,
        /// Caller-supplied state rewrote the room's view rather than
        /// extending it.
        rewrites_state: bool,
    },
    /// A backfilled historical event.
    OldRoomEvent { event: HeaderedPdu },
    /// Both sides of a redaction pairing are durable; consumers should
    /// apply the projection.
    RedactedEvent {
        redacted_event_id: OwnedEventId,
        redacted_because: HeaderedPdu,
    },
}

pub struct Service {
    pub db: &'static dyn Data,
}

impl Service {
    /// Append entries to the room's output log, in order.
    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    pub fn write_output_events(
        &self,
        room_id: &RoomId,
        events: Vec<OutputRoomEvent>,
    ) -> Result<()> {
        self.db.write_output_events(room_id, events)
    }
}
