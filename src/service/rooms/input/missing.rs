// =============================================================================
// Eventide Matrix Homeserver - Missing Ancestor Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Ensures every auth ancestor of an incoming event is stored locally
//   before the auth checks run. Unknown ancestors are fetched from the
//   federation in one query and inserted in reverse topological order on
//   auth edges, so each event's own ancestors are interned before it is.
//
// =============================================================================

use std::collections::HashMap;

use ruma::OwnedEventId;
use tracing::debug;

use crate::{
    service::{
        pdu::HeaderedPdu,
        rooms::types::{EventNid, InputRoomEvent},
    },
    Error, Result,
};

impl super::Service {
    /// Resolve the auth ancestors of `event`, fetching and storing any
    /// that are missing. `cache` is local to one ingest call and
    /// accumulates every `event id -> NID` binding seen along the way,
    /// preferring in-memory hits over store lookups.
    #[tracing::instrument(skip(self, event, cache), fields(event_id = %event.pdu.event_id))]
    pub(super) async fn check_for_missing_auth_events(
        &self,
        event: &HeaderedPdu,
        cache: &mut HashMap<OwnedEventId, EventNid>,
    ) -> Result<()> {
        let auth_event_ids: Vec<OwnedEventId> = event
            .pdu
            .auth_events
            .iter()
            .map(|id| id.as_ref().to_owned())
            .collect();
        if auth_event_ids.is_empty() {
            return Ok(());
        }

        let known = self.db.event_nids(&auth_event_ids)?;
        let missing: Vec<OwnedEventId> = auth_event_ids
            .iter()
            .filter(|id| !known.contains_key(*id))
            .cloned()
            .collect();
        cache.extend(known);

        if missing.is_empty() {
            return Ok(());
        }

        debug!(
            missing = missing.len(),
            "Fetching missing auth events over federation"
        );
        let response = self
            .federation
            .query_event_auth(&event.pdu.room_id, &event.pdu.event_id)
            .await?;

        // Peers may return a superset of the auth chain and in any
        // order; insert ancestors before descendants.
        for fetched in reverse_topological_ordering(response.events) {
            if cache.contains_key(fetched.pdu.event_id.as_ref()) {
                continue;
            }

            // Prefer the cache accumulated during this resolution, then
            // the store, for the fetched event's own auth ancestors.
            let needed: Vec<OwnedEventId> = fetched
                .pdu
                .auth_events
                .iter()
                .map(|id| id.as_ref().to_owned())
                .filter(|id| !cache.contains_key(id))
                .collect();
            if !needed.is_empty() {
                cache.extend(self.db.event_nids(&needed)?);
            }

            let mut auth_event_nids = Vec::with_capacity(fetched.pdu.auth_events.len());
            for auth_id in &fetched.pdu.auth_events {
                match cache.get(auth_id.as_ref()) {
                    Some(nid) => auth_event_nids.push(*nid),
                    // The chain the peer returned is incomplete; nothing
                    // sensible can be persisted from it.
                    None => {
                        return Err(Error::MissingAuthEvents(
                            fetched.pdu.event_id.as_ref().to_owned(),
                        ))
                    }
                }
            }

            let stored = self.db.store_event(
                &fetched.pdu,
                &fetched.room_version,
                &auth_event_nids,
                false,
            )?;
            cache.insert(fetched.pdu.event_id.as_ref().to_owned(), stored.event_nid);
        }

        Ok(())
    }

    /// Hook for resolving missing prev events. Deliberately a no-op:
    /// missing prev events do not block ingest and are tolerated until
    /// backfill catches up. A stricter causality policy would slot in
    /// here.
    pub(super) fn check_for_missing_prev_events(&self, _input: &InputRoomEvent) -> Result<()> {
        Ok(())
    }
}

/// Order events so that auth ancestors come before their descendants,
/// considering only edges within the given set. Ready events are emitted
/// in event-id order, which makes the ordering deterministic regardless
/// of the order the peer returned them in. Events on a cycle (malformed
/// data) are appended at the end, also in id order.
pub(super) fn reverse_topological_ordering(events: Vec<HeaderedPdu>) -> Vec<HeaderedPdu> {
    use std::collections::BTreeMap;

    let mut remaining: BTreeMap<OwnedEventId, HeaderedPdu> = events
        .into_iter()
        .map(|event| (event.pdu.event_id.as_ref().to_owned(), event))
        .collect();

    let mut ordered = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let ready: Vec<OwnedEventId> = remaining
            .iter()
            .filter(|(_, event)| {
                !event
                    .pdu
                    .auth_events
                    .iter()
                    .any(|auth_id| remaining.contains_key(auth_id.as_ref()))
            })
            .map(|(id, _)| id.clone())
            .collect();

        if ready.is_empty() {
            // Auth edges never cycle in valid data; drain what is left
            // deterministically rather than spinning.
            ordered.extend(std::mem::take(&mut remaining).into_values());
            break;
        }

        for id in ready {
            if let Some(event) = remaining.remove(&id) {
                ordered.push(event);
            }
        }
    }

    ordered
}
