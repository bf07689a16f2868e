// =============================================================================
// Eventide Matrix Homeserver - Timeline Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Service facade over event persistence. All writes go through
//   `store_event`, which is the only place event NIDs are allocated;
//   every stored event's auth ancestors are therefore interned before
//   the event itself.
//
// =============================================================================

mod data;

use std::{collections::HashMap, sync::Arc};

pub use data::{Data, StoredEvent};
use ruma::{EventId, OwnedEventId, RoomId, RoomVersionId};

use crate::{
    service::{
        pdu::PduEvent,
        rooms::types::{EventNid, RoomInfo},
    },
    Result,
};

pub struct Service {
    pub db: &'static dyn Data,
}

impl Service {
    pub fn events_from_ids(&self, ids: &[OwnedEventId]) -> Result<Vec<Arc<PduEvent>>> {
        self.db.events_from_ids(ids)
    }

    pub fn event_from_id(&self, id: &EventId) -> Result<Option<Arc<PduEvent>>> {
        self.db.event_from_id(id)
    }

    pub fn event_nids(&self, ids: &[OwnedEventId]) -> Result<HashMap<OwnedEventId, EventNid>> {
        self.db.event_nids(ids)
    }

    pub fn event_ids_from_nids(
        &self,
        nids: &[EventNid],
    ) -> Result<HashMap<EventNid, OwnedEventId>> {
        self.db.event_ids_from_nids(nids)
    }

    #[tracing::instrument(skip(self, event))]
    pub fn store_event(
        &self,
        event: &PduEvent,
        room_version: &RoomVersionId,
        auth_event_nids: &[EventNid],
        rejected: bool,
    ) -> Result<StoredEvent> {
        self.db
            .store_event(event, room_version, auth_event_nids, rejected)
    }

    pub fn replace_event(&self, event_nid: EventNid, pdu: &PduEvent) -> Result<()> {
        self.db.replace_event(event_nid, pdu)
    }

    pub fn room_info(&self, room_id: &RoomId) -> Result<Option<RoomInfo>> {
        self.db.room_info(room_id)
    }
}
