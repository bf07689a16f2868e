// =============================================================================
// Eventide Matrix Homeserver - State Data Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// =============================================================================

use ruma::{OwnedEventId, RoomId};

use crate::{
    service::rooms::types::{EventNid, RoomNid, StateAtEvent, StateEntry, StateSnapshotNid},
    Result,
};

/// Snapshot and extremity storage. Snapshots are immutable and
/// content-addressed: the store may hand back an existing NID for a
/// semantically identical snapshot.
pub trait Data: Send + Sync {
    /// Persist a snapshot composed of the given base snapshots plus the
    /// entries, returning its NID. Entries must already be deduplicated
    /// on state key tuple.
    fn add_state(
        &self,
        room_nid: RoomNid,
        base_snapshots: &[StateSnapshotNid],
        entries: &[StateEntry],
    ) -> Result<StateSnapshotNid>;

    /// Bind a "state before" snapshot to an event.
    fn set_state(&self, event_nid: EventNid, snapshot_nid: StateSnapshotNid) -> Result<()>;

    /// The state-at-event records for the given events. Unknown events
    /// are an error: callers must have stored every event they ask about.
    fn state_at_events_for_ids(&self, event_ids: &[OwnedEventId]) -> Result<Vec<StateAtEvent>>;

    /// Materialize the entries of a snapshot, bases included.
    fn state_entries_for_snapshot(&self, snapshot: StateSnapshotNid) -> Result<Vec<StateEntry>>;

    /// Resolve state-event ids to their snapshot entries. Non-state or
    /// unknown events are an error.
    fn state_entries_for_event_ids(&self, ids: &[OwnedEventId]) -> Result<Vec<StateEntry>>;

    /// The stored, accepted events with no known children.
    fn get_forward_extremities(&self, room_id: &RoomId) -> Result<Vec<OwnedEventId>>;

    /// Atomically replace the forward extremity set.
    fn set_forward_extremities(
        &self,
        room_id: &RoomId,
        extremities: Vec<OwnedEventId>,
    ) -> Result<()>;

    /// The cached "latest state" snapshot for the room, `NONE` before the
    /// first extremity update.
    fn current_state_snapshot(&self, room_nid: RoomNid) -> Result<StateSnapshotNid>;

    fn set_current_state_snapshot(
        &self,
        room_nid: RoomNid,
        snapshot: StateSnapshotNid,
    ) -> Result<()>;

    /// Membership event NIDs for the room, optionally restricted to
    /// joined members and to users local to this server.
    fn membership_event_nids_for_room(
        &self,
        room_nid: RoomNid,
        joined_only: bool,
        local_only: bool,
    ) -> Result<Vec<EventNid>>;
}
