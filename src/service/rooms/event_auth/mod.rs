// =============================================================================
// Eventide Matrix Homeserver - Event Auth Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   The two layered authorization checks of the ingest pipeline. The
//   static check evaluates an event against the state implied by its
//   declared auth events; the soft-fail check re-runs the same rules
//   against the room's current state, so an event forged onto a stale
//   DAG path (say, by a freshly banned user) is stored but never
//   amplified. Rejection is a terminal classification, not an error:
//   both functions return transport failures through `Result` and
//   verdicts as values.
//
// =============================================================================

use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
};

use ruma::{events::StateEventType, state_res, OwnedEventId};
use tracing::debug;

use crate::{
    service::{
        pdu::{HeaderedPdu, PduEvent},
        rooms::{self, state, types::EventNid},
    },
    Error, Result,
};

/// Why an event was rejected by the static auth check. Persisted events
/// carry this back to the caller alongside the event id so the reason
/// can be surfaced without triggering retries.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("Auth event {0} is not known to this server")]
    MissingAuthEvent(OwnedEventId),

    #[error("Auth event {0} is not a state event")]
    NotAStateEvent(OwnedEventId),

    #[error("Auth event type and state key combination exists multiple times")]
    DuplicateAuthTuple,

    #[error("Event did not pass the auth rules of its room version: {0}")]
    AuthCheckFailed(String),
}

/// Verify an event against its declared auth events and resolve their
/// NIDs. The NIDs of the auth events that are known are returned even
/// when the verdict is a rejection, so the caller can persist the
/// rejected event with as much of its auth ancestry interned as exists.
#[tracing::instrument(skip(db, headered), fields(event_id = %headered.pdu.event_id))]
pub fn check_auth_events(
    db: &'static dyn rooms::Data,
    headered: &HeaderedPdu,
    declared_auth_event_ids: &[OwnedEventId],
) -> Result<(Vec<EventNid>, Option<RejectionReason>)> {
    let rules = headered.rules()?;

    let fetched = db.events_from_ids(declared_auth_event_ids)?;
    let by_id: HashMap<_, _> = fetched
        .iter()
        .map(|pdu| (pdu.event_id.as_ref().to_owned(), pdu))
        .collect();

    let nid_map = db.event_nids(declared_auth_event_ids)?;
    let mut auth_event_nids = Vec::with_capacity(declared_auth_event_ids.len());
    for id in declared_auth_event_ids {
        if let Some(nid) = nid_map.get(id) {
            auth_event_nids.push(*nid);
        }
    }

    // Build the state implied by the declared auth events: state events
    // only, at most one per (type, state key) tuple.
    let mut auth_events: HashMap<(StateEventType, String), Arc<PduEvent>> = HashMap::new();
    for id in declared_auth_event_ids {
        let Some(&auth_event) = by_id.get(id) else {
            return Ok((
                auth_event_nids,
                Some(RejectionReason::MissingAuthEvent(id.clone())),
            ));
        };

        let Some(state_key) = auth_event.state_key.clone() else {
            return Ok((
                auth_event_nids,
                Some(RejectionReason::NotAStateEvent(id.clone())),
            ));
        };

        match auth_events.entry((auth_event.kind.to_string().into(), state_key)) {
            Entry::Vacant(v) => {
                v.insert(auth_event.clone());
            }
            Entry::Occupied(_) => {
                return Ok((auth_event_nids, Some(RejectionReason::DuplicateAuthTuple)));
            }
        }
    }

    if let Err(e) = state_res::event_auth::auth_check(&rules.authorization, &*headered.pdu, |k, s| {
        auth_events.get(&(k.to_string().into(), s.to_owned()))
    }) {
        return Ok((
            auth_event_nids,
            Some(RejectionReason::AuthCheckFailed(e.to_string())),
        ));
    }

    debug!("Auth check against declared auth events passed");
    Ok((auth_event_nids, None))
}

/// Re-run the auth rules against the current room state. Returns `true`
/// when the event would not be allowed now, even though it may have been
/// valid at its logical point in history.
///
/// `current_state_ids` is the caller-asserted state when present;
/// otherwise the current state is derived from the room's forward
/// extremities. Only the state tuples relevant to this event's auth are
/// consulted.
#[tracing::instrument(skip(db, headered, current_state_ids), fields(event_id = %headered.pdu.event_id))]
pub fn check_for_soft_fail(
    db: &'static dyn rooms::Data,
    headered: &HeaderedPdu,
    current_state_ids: &[OwnedEventId],
) -> Result<bool> {
    let rules = headered.rules()?;
    let pdu = &headered.pdu;

    let state_ids = if !current_state_ids.is_empty() {
        current_state_ids.to_vec()
    } else {
        match db.room_info(&pdu.room_id)? {
            Some(room_info) => state::Service { db }.current_room_state_ids(&room_info)?,
            // First event of a room is authed against empty state.
            None => Vec::new(),
        }
    };

    let auth_types = state_res::auth_types_for_event(
        &pdu.kind,
        &pdu.sender,
        pdu.state_key.as_deref(),
        &pdu.content,
        &rules.authorization,
    )
    .map_err(|e| Error::BadEvent(format!("Invalid event content: {}", e)))?;

    let mut auth_events = HashMap::new();
    for state_event in db.events_from_ids(&state_ids)? {
        let Some(state_key) = state_event.state_key.clone() else {
            continue;
        };
        let tuple = (state_event.kind.to_string().into(), state_key);
        if auth_types.contains(&tuple) {
            auth_events.insert(tuple, state_event);
        }
    }

    let soft_fail = state_res::event_auth::auth_check(&rules.authorization, &**pdu, |k, s| {
        auth_events.get(&(k.to_string().into(), s.to_owned()))
    })
    .is_err();

    if soft_fail {
        debug!("Event fails auth against current room state");
    }

    Ok(soft_fail)
}
