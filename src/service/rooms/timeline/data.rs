// =============================================================================
// Eventide Matrix Homeserver - Timeline Data Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// =============================================================================

use std::{collections::HashMap, sync::Arc};

use ruma::{EventId, OwnedEventId, RoomId, RoomVersionId};

use crate::{
    service::{
        pdu::PduEvent,
        rooms::types::{EventNid, RoomInfo, StateAtEvent},
    },
    Result,
};

/// Result of persisting one event.
#[derive(Clone, Debug)]
pub struct StoredEvent {
    pub event_nid: EventNid,
    pub state_at_event: StateAtEvent,
    /// Set when storing this event completed a redaction pairing, in
    /// either direction: the redaction event of the pair and the id of
    /// the event being redacted.
    pub redaction_pdu: Option<Arc<PduEvent>>,
    pub redacted_event_id: Option<OwnedEventId>,
}

/// Persistence contract for events and room metadata.
pub trait Data: Send + Sync {
    /// Fetch full events by id; unknown ids are simply absent from the
    /// result.
    fn events_from_ids(&self, ids: &[OwnedEventId]) -> Result<Vec<Arc<PduEvent>>>;

    /// Single-event convenience used by auth replay during state
    /// resolution.
    fn event_from_id(&self, id: &EventId) -> Result<Option<Arc<PduEvent>>>;

    /// Map event ids to NIDs for events already stored. Returns a partial
    /// map: unknown ids are omitted.
    fn event_nids(&self, ids: &[OwnedEventId]) -> Result<HashMap<OwnedEventId, EventNid>>;

    /// Reverse mapping for snapshot materialization.
    fn event_ids_from_nids(&self, nids: &[EventNid]) -> Result<HashMap<EventNid, OwnedEventId>>;

    /// Persist an event. Atomic and idempotent on event id: storing the
    /// same id again returns the original allocation without side
    /// effects. Allocates the event NID, records the rejected flag, and
    /// reports whether storing this event caused, or was caused by, a
    /// redaction pairing.
    fn store_event(
        &self,
        event: &PduEvent,
        room_version: &RoomVersionId,
        auth_event_nids: &[EventNid],
        rejected: bool,
    ) -> Result<StoredEvent>;

    /// Replace the stored body of an event with its redacted projection.
    /// The original body remains addressable by the store.
    fn replace_event(&self, event_nid: EventNid, pdu: &PduEvent) -> Result<()>;

    /// Current room metadata, or `None` for rooms this server has never
    /// seen an event for.
    fn room_info(&self, room_id: &RoomId) -> Result<Option<RoomInfo>>;
}
