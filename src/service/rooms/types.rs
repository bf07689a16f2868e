// =============================================================================
// Eventide Matrix Homeserver - Room Types Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Numeric-id (NID) newtypes and the ingestion work item. NIDs intern
//   string identifiers into compact integers issued by the store; state
//   snapshots hold hundreds of bytes of integers instead of kilobytes of
//   strings, which keeps state merges tractable.
//
// =============================================================================

use std::fmt;

use ruma::{OwnedEventId, OwnedRoomId, OwnedServerName, OwnedTransactionId, RoomVersionId};
use serde::{Deserialize, Serialize};

use crate::service::pdu::HeaderedPdu;

/// Compact integer interning of an event id, issued by the store on first
/// persistence and stable thereafter.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EventNid(pub u64);

/// Compact integer interning of a room id.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RoomNid(pub u64);

/// Compact integer interning of an `(event type, state key)` tuple.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct StateKeyTupleNid(pub u64);

/// Identifier of an immutable state snapshot. Zero is the sentinel for
/// "no snapshot computed yet".
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct StateSnapshotNid(pub u64);

impl StateSnapshotNid {
    pub const NONE: StateSnapshotNid = StateSnapshotNid(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for EventNid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for StateSnapshotNid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One entry of a state snapshot: the interned `(type, state key)` tuple
/// and the state event currently occupying it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateEntry {
    pub state_key_nid: StateKeyTupleNid,
    pub event_nid: EventNid,
}

/// Room state immediately before applying an event, as recorded by the
/// store. Written exactly once per event; `before_state_snapshot_nid`
/// stays `NONE` until the state resolution engine binds a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateAtEvent {
    pub event_nid: EventNid,
    /// The event's own interned state tuple, present iff it is a state
    /// event.
    pub state_key_nid: Option<StateKeyTupleNid>,
    pub before_state_snapshot_nid: StateSnapshotNid,
    pub is_rejected: bool,
    /// Caller-supplied state replaces the local view wholesale instead of
    /// being merged.
    pub overwrite: bool,
}

impl StateAtEvent {
    /// The snapshot contribution this event makes if accepted.
    pub fn state_entry(&self) -> Option<StateEntry> {
        self.state_key_nid.map(|state_key_nid| StateEntry {
            state_key_nid,
            event_nid: self.event_nid,
        })
    }
}

/// Room metadata owned by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: OwnedRoomId,
    pub room_nid: RoomNid,
    pub room_version: RoomVersionId,
}

/// How an incoming event relates to the room DAG frontier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
    /// A freshly received forward-edge event; may update extremities.
    New,
    /// A backfilled historical event; never touches extremities.
    Old,
    /// A sideloaded auth-chain event with no state implications here.
    Outlier,
}

/// The unit of work fed to the ingest orchestrator.
#[derive(Clone, Debug)]
pub struct InputRoomEvent {
    pub kind: InputKind,
    pub event: HeaderedPdu,
    /// Override for the event's declared auth events; empty means use the
    /// event's own `auth_events`.
    pub auth_event_ids: Vec<OwnedEventId>,
    /// Caller-asserted state at the event, honored when `has_state`.
    pub state_event_ids: Vec<OwnedEventId>,
    pub has_state: bool,
    pub send_as_server: Option<OwnedServerName>,
    pub transaction_id: Option<OwnedTransactionId>,
}

/// Normalize snapshot entries: sorted, and at most one entry per state
/// key tuple. On a tuple collision the entry with the highest event NID
/// wins, which is deterministic regardless of input order.
pub fn deduplicate_state_entries(mut entries: Vec<StateEntry>) -> Vec<StateEntry> {
    entries.sort_unstable();
    entries.reverse();
    entries.dedup_by_key(|entry| entry.state_key_nid);
    entries.reverse();
    entries
}
