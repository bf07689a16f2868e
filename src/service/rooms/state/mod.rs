// =============================================================================
// Eventide Matrix Homeserver - State Resolution Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Computes and persists "state before event" snapshots. A single prev
//   event reuses or minimally extends its parent snapshot; multiple prev
//   events are merged with the room-version state resolution rules,
//   replaying auth against the unconflicted seed and the auth chains of
//   the conflicting events. Conflict winners, depth and event-id
//   tie-breaks are the responsibility of the ruma state-res engine.
//
// Dependencies:
//   • Matrix state resolution with ruma state_res
//   • Structured logging with tracing
//
// =============================================================================

mod data;

use std::{collections::HashSet, sync::Arc};

pub use data::Data;
use ruma::{
    state_res::{self, StateMap},
    EventId, OwnedEventId,
};
use tracing::{debug, warn};

use crate::{
    service::{
        pdu::PduEvent,
        rooms::types::{
            deduplicate_state_entries, InputRoomEvent, RoomInfo, StateAtEvent, StateEntry,
            StateSnapshotNid,
        },
    },
    Error, Result,
};

pub struct Service {
    pub db: &'static dyn crate::service::rooms::Data,
}

impl Service {
    /// Decide how the "state before" snapshot for an event is obtained
    /// and bind it to the event.
    ///
    /// When the caller asserted the state (`has_state`) and the event is
    /// not rejected, the supplied state events are resolved to entries
    /// and stored as-is. The `overwrite` flag is raised iff no local
    /// users are joined to the room: a local view nobody is using is
    /// considered stale and replaced wholesale rather than merged.
    #[tracing::instrument(skip(self, input, state_at_event, event))]
    pub fn calculate_and_set_state(
        &self,
        input: &InputRoomEvent,
        room_info: &RoomInfo,
        state_at_event: &mut StateAtEvent,
        event: &PduEvent,
        is_rejected: bool,
    ) -> Result<()> {
        if input.has_state && !is_rejected {
            state_at_event.overwrite = true;
            if let Ok(join_event_nids) =
                self.db
                    .membership_event_nids_for_room(room_info.room_nid, true, true)
            {
                state_at_event.overwrite = join_event_nids.is_empty();
            }

            let entries = self.db.state_entries_for_event_ids(&input.state_event_ids)?;
            let entries = deduplicate_state_entries(entries);

            state_at_event.before_state_snapshot_nid =
                self.db.add_state(room_info.room_nid, &[], &entries)?;
        } else {
            state_at_event.overwrite = false;
            state_at_event.before_state_snapshot_nid =
                self.calculate_and_store_state_before_event(room_info, event, is_rejected)?;
        }

        self.db.set_state(
            state_at_event.event_nid,
            state_at_event.before_state_snapshot_nid,
        )
    }

    /// Compute and persist the "state before" snapshot from the event's
    /// prev events. Rejected events get a snapshot too; only their own
    /// state contribution is withheld, and that happens at read time via
    /// the stored rejected flag.
    #[tracing::instrument(skip(self, event), fields(event_id = %event.event_id))]
    pub fn calculate_and_store_state_before_event(
        &self,
        room_info: &RoomInfo,
        event: &PduEvent,
        is_rejected: bool,
    ) -> Result<StateSnapshotNid> {
        let prev_event_ids: Vec<OwnedEventId> = event
            .prev_events
            .iter()
            .map(|id| id.as_ref().to_owned())
            .collect();

        if prev_event_ids.is_empty() {
            // The room's first event has empty state before it.
            debug!(rejected = is_rejected, "Event starts the room, storing empty state");
            return self.db.add_state(room_info.room_nid, &[], &[]);
        }

        let prev_states = self.db.state_at_events_for_ids(&prev_event_ids)?;

        if let [prev] = prev_states.as_slice() {
            if prev.before_state_snapshot_nid.is_none() {
                return Err(Error::bad_database(
                    "State not yet calculated for the only prev event",
                ));
            }

            // State before this event is state after its only parent.
            // When the parent contributes nothing, reuse its snapshot
            // instead of storing a new one.
            return match prev.state_entry().filter(|_| !prev.is_rejected) {
                None => Ok(prev.before_state_snapshot_nid),
                Some(entry) => self.db.add_state(
                    room_info.room_nid,
                    &[prev.before_state_snapshot_nid],
                    &[entry],
                ),
            };
        }

        let mut forks = Vec::with_capacity(prev_states.len());
        for prev in &prev_states {
            forks.push(self.state_after_event(prev)?);
        }

        let resolved = self.resolve_conflicts(room_info, forks)?;
        self.db.add_state(room_info.room_nid, &[], &resolved)
    }

    /// The merged room state after the given events, as snapshot entries.
    /// Shared by state-before calculation and by the current-state view
    /// over the forward extremities.
    pub fn resolve_state_after(
        &self,
        room_info: &RoomInfo,
        event_ids: &[OwnedEventId],
    ) -> Result<Vec<StateEntry>> {
        let states = self.db.state_at_events_for_ids(event_ids)?;

        let mut forks = Vec::with_capacity(states.len());
        for at in &states {
            forks.push(self.state_after_event(at)?);
        }

        self.resolve_conflicts(room_info, forks)
    }

    /// The event ids of the room's current state, derived from the
    /// forward extremities. Empty for rooms with no accepted events yet.
    pub fn current_room_state_ids(&self, room_info: &RoomInfo) -> Result<Vec<OwnedEventId>> {
        let extremities = self.db.get_forward_extremities(&room_info.room_id)?;
        if extremities.is_empty() {
            return Ok(Vec::new());
        }

        let entries = self.resolve_state_after(room_info, &extremities)?;
        let nids: Vec<_> = entries.iter().map(|entry| entry.event_nid).collect();
        let ids = self.db.event_ids_from_nids(&nids)?;

        entries
            .iter()
            .map(|entry| {
                ids.get(&entry.event_nid)
                    .cloned()
                    .ok_or_else(|| Error::bad_database("Snapshot references unknown event NID"))
            })
            .collect()
    }

    /// "State after" = "state before" extended with the event's own
    /// entry iff it is an accepted state event.
    fn state_after_event(&self, at: &StateAtEvent) -> Result<Vec<StateEntry>> {
        if at.before_state_snapshot_nid.is_none() {
            return Err(Error::bad_database(
                "State not yet calculated for a prev event",
            ));
        }

        let mut entries = self
            .db
            .state_entries_for_snapshot(at.before_state_snapshot_nid)?;

        if let Some(entry) = at.state_entry().filter(|_| !at.is_rejected) {
            entries.retain(|existing| existing.state_key_nid != entry.state_key_nid);
            entries.push(entry);
        }

        Ok(deduplicate_state_entries(entries))
    }

    /// Merge fork states with the room-version resolution rules. A single
    /// fork short-circuits; otherwise each fork is materialized to a
    /// `StateMap`, the auth chains of its members are collected, and the
    /// ruma resolver picks the winners.
    fn resolve_conflicts(
        &self,
        room_info: &RoomInfo,
        mut forks: Vec<Vec<StateEntry>>,
    ) -> Result<Vec<StateEntry>> {
        match forks.len() {
            0 => return Ok(Vec::new()),
            1 => return Ok(deduplicate_state_entries(forks.remove(0))),
            _ => {}
        }

        let rules = room_info
            .room_version
            .rules()
            .ok_or_else(|| Error::UnsupportedRoomVersion(room_info.room_version.clone()))?;

        let mut fork_states = Vec::with_capacity(forks.len());
        let mut auth_chain_sets = Vec::with_capacity(forks.len());
        for fork in &forks {
            let state = self.state_map_from_entries(fork)?;
            let starting_events: Vec<Arc<EventId>> = state.values().cloned().collect();
            auth_chain_sets.push(self.auth_chain_for(starting_events)?);
            fork_states.push(state);
        }

        debug!(forks = fork_states.len(), "Resolving state across forks");

        let fetch_event = |id: &EventId| {
            let res = self.db.event_from_id(id);
            if let Err(e) = &res {
                warn!("Failed to fetch event for state resolution: {}", e);
            }
            res.ok().flatten()
        };

        let resolved =
            state_res::resolve(&rules.authorization, &fork_states, auth_chain_sets, fetch_event)
                .map_err(|e| {
                    Error::bad_database(format!(
                        "State resolution failed, an event could not be found or loaded: {}",
                        e
                    ))
                })?;

        self.entries_from_state_map(resolved)
    }

    /// Walk the auth references of the given events transitively. The
    /// graph is recomputed from stored `auth_events` fields on demand; no
    /// adjacency is cached.
    fn auth_chain_for(&self, starting_events: Vec<Arc<EventId>>) -> Result<HashSet<Arc<EventId>>> {
        let mut chain = HashSet::new();
        let mut frontier: Vec<OwnedEventId> = starting_events
            .iter()
            .map(|id| id.as_ref().to_owned())
            .collect();

        while !frontier.is_empty() {
            let events = self.db.events_from_ids(&frontier)?;
            frontier = Vec::new();
            for event in events {
                for auth_id in &event.auth_events {
                    if chain.insert(Arc::clone(auth_id)) {
                        frontier.push(auth_id.as_ref().to_owned());
                    }
                }
            }
        }

        Ok(chain)
    }

    fn state_map_from_entries(&self, entries: &[StateEntry]) -> Result<StateMap<Arc<EventId>>> {
        let nids: Vec<_> = entries.iter().map(|entry| entry.event_nid).collect();
        let ids = self.db.event_ids_from_nids(&nids)?;

        let mut state = StateMap::with_capacity(entries.len());
        for entry in entries {
            let (event_type, state_key) = self.db.get_state_key_from_nid(entry.state_key_nid)?;
            let event_id = ids
                .get(&entry.event_nid)
                .ok_or_else(|| Error::bad_database("Snapshot references unknown event NID"))?;
            state.insert(
                (event_type.to_string().into(), state_key),
                Arc::from(&**event_id),
            );
        }

        Ok(state)
    }

    fn entries_from_state_map(&self, state: StateMap<Arc<EventId>>) -> Result<Vec<StateEntry>> {
        let mut entries = Vec::with_capacity(state.len());
        let event_ids: Vec<OwnedEventId> = state
            .values()
            .map(|id| id.as_ref().to_owned())
            .collect();
        let nids = self.db.event_nids(&event_ids)?;

        for ((event_type, state_key), event_id) in state {
            let state_key_nid = self
                .db
                .get_or_create_state_key_nid(&event_type.to_string().into(), &state_key)?;
            let event_nid = nids
                .get(&*event_id)
                .copied()
                .ok_or_else(|| Error::bad_database("Resolved state names an unstored event"))?;
            entries.push(StateEntry {
                state_key_nid,
                event_nid,
            });
        }

        Ok(deduplicate_state_entries(entries))
    }
}
