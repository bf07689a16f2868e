// =============================================================================
// Eventide Matrix Homeserver - Latest Events Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Forward-extremity maintenance for accepted `New` events: the room's
//   frontier becomes `(old extremities \ prev_events) ∪ {event}`, the
//   cached latest-state snapshot is recomputed across the new frontier,
//   and the resulting state delta rides out on the `NewRoomEvent`
//   output entry.
//
// =============================================================================

use std::collections::HashSet;
use std::sync::Arc;

use ruma::OwnedEventId;
use tracing::debug;

use crate::{
    service::{
        pdu::{HeaderedPdu, PduEvent},
        rooms::{
            output::OutputRoomEvent,
            types::{InputRoomEvent, RoomInfo, StateAtEvent, StateEntry},
        },
    },
    Error, Result,
};

impl super::Service {
    /// Replace the room's forward extremities with the incoming event's
    /// frontier and emit the `NewRoomEvent` output entry. Only called
    /// for accepted, non-soft-failed `New` events.
    #[tracing::instrument(skip_all, fields(event_id = %event.event_id))]
    pub(super) fn update_latest_events(
        &self,
        input: &InputRoomEvent,
        room_info: &RoomInfo,
        state_at_event: &StateAtEvent,
        event: &PduEvent,
    ) -> Result<()> {
        let old_extremities = self.db.get_forward_extremities(&event.room_id)?;

        let mut extremities: Vec<OwnedEventId> = old_extremities
            .into_iter()
            .filter(|id| !event.prev_events.iter().any(|prev| prev.as_ref() == &**id))
            .collect();
        let own_id = event.event_id.as_ref().to_owned();
        if !extremities.contains(&own_id) {
            extremities.push(own_id);
        }

        self.db
            .set_forward_extremities(&event.room_id, extremities.clone())?;
        debug!(extremities = extremities.len(), "Replaced forward extremities");

        // Refresh the cached latest-state snapshot and work out what
        // changed relative to the previous one.
        let old_snapshot = self.db.current_state_snapshot(room_info.room_nid)?;
        let old_entries = if old_snapshot.is_none() {
            Vec::new()
        } else {
            self.db.state_entries_for_snapshot(old_snapshot)?
        };

        let new_entries = self.state.resolve_state_after(room_info, &extremities)?;
        let new_snapshot = self
            .db
            .add_state(room_info.room_nid, &[], &new_entries)?;
        self.db
            .set_current_state_snapshot(room_info.room_nid, new_snapshot)?;

        let old_set: HashSet<StateEntry> = old_entries.iter().copied().collect();
        let new_set: HashSet<StateEntry> = new_entries.iter().copied().collect();
        let added: Vec<StateEntry> = new_entries
            .iter()
            .filter(|entry| !old_set.contains(entry))
            .copied()
            .collect();
        let removed: Vec<StateEntry> = old_entries
            .iter()
            .filter(|entry| !new_set.contains(entry))
            .copied()
            .collect();

        self.output.write_output_events(
            &event.room_id,
            vec![OutputRoomEvent::NewRoomEvent {
                event: HeaderedPdu {
                    room_version: room_info.room_version.clone(),
                    pdu: Arc::new(event.clone()),
                },
                adds_state_event_ids: self.event_ids_for_entries(&added)?,
                removes_state_event_ids: self.event_ids_for_entries(&removed)?,
                send_as_server: input.send_as_server.clone(),
                transaction_id: input.transaction_id.clone(),
                rewrites_state: state_at_event.overwrite,
            }],
        )
    }

    fn event_ids_for_entries(&self, entries: &[StateEntry]) -> Result<Vec<OwnedEventId>> {
        let nids: Vec<_> = entries.iter().map(|entry| entry.event_nid).collect();
        let ids = self.db.event_ids_from_nids(&nids)?;
        entries
            .iter()
            .map(|entry| {
                ids.get(&entry.event_nid)
                    .cloned()
                    .ok_or_else(|| Error::bad_database("State delta references unknown event NID"))
            })
            .collect()
    }
}
