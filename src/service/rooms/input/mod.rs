// =============================================================================
// Eventide Matrix Homeserver - Room Input Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   The per-event ingest state machine. Each incoming room event is
//   deduplicated, completed (missing auth ancestors fetched over
//   federation), authorized twice (against its declared auth events and
//   against current room state), persisted with numeric interning, bound
//   to a "state before" snapshot, and finally turned into forward
//   extremity updates and ordered output-log entries.
//
//   Processing is serialized per room: state resolution correctness
//   depends on a consistent view of the forward extremities, and the
//   output log must be totally ordered per room. Other rooms proceed in
//   parallel.
//
// Dependencies:
//   • Tokio async runtime and sync primitives
//   • Structured logging with tracing
//   • Matrix protocol types with ruma
//   • Processing latency histogram with prometheus
//
// =============================================================================

mod latest;
mod missing;

use std::{
    collections::HashMap,
    sync::Arc,
    time::Instant,
};

use ruma::{OwnedEventId, OwnedRoomId, RoomVersionId};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::{
    metrics::Metrics,
    service::{
        federation,
        pdu::HeaderedPdu,
        rooms::{
            self, event_auth,
            event_auth::RejectionReason,
            output::{self, OutputRoomEvent},
            state,
            types::{InputKind, InputRoomEvent},
        },
    },
    Error, Result,
};

/// Outcome of one `process_room_event` call. The event id is canonical
/// for the stored event; `rejection` carries the auth verdict for events
/// that were persisted but classified as rejected.
#[derive(Clone, Debug)]
pub struct ProcessedEvent {
    pub event_id: OwnedEventId,
    pub rejection: Option<RejectionReason>,
}

pub struct Service {
    pub db: &'static dyn rooms::Data,
    pub federation: federation::Service,
    pub output: output::Service,
    pub state: state::Service,
    metrics: Metrics,
    room_mutexes: RwLock<HashMap<OwnedRoomId, Arc<Mutex<()>>>>,
}

impl Service {
    pub fn new(
        db: &'static dyn rooms::Data,
        federation: &'static dyn federation::Data,
        output_sink: &'static dyn output::Data,
        metrics: Metrics,
    ) -> Self {
        Self {
            db,
            federation: federation::Service { db: federation },
            output: output::Service { db: output_sink },
            state: state::Service { db },
            metrics,
            room_mutexes: RwLock::new(HashMap::new()),
        }
    }

    /// Ingest one room event. At most one call is in flight per room at
    /// any time; callers batch one event per call and retry on transient
    /// errors. Wall-clock duration is observed into the per-room
    /// histogram on every path, early returns included.
    #[tracing::instrument(skip(self, input), fields(
        event_id = %input.event.pdu.event_id,
        room_id = %input.event.pdu.room_id,
        kind = ?input.kind,
    ))]
    pub async fn process_room_event(&self, input: InputRoomEvent) -> Result<ProcessedEvent> {
        let started = Instant::now();
        let room_id = input.event.pdu.room_id.clone();

        let mutex = Arc::clone(
            self.room_mutexes
                .write()
                .await
                .entry(room_id.clone())
                .or_default(),
        );
        let _serialization_guard = mutex.lock().await;

        let result = self.process_serialized(input).await;

        self.metrics
            .process_room_event_duration
            .with_label_values(&[room_id.as_str()])
            .observe(started.elapsed().as_secs_f64() * 1000.0);

        result
    }

    async fn process_serialized(&self, input: InputRoomEvent) -> Result<ProcessedEvent> {
        let headered = &input.event;
        let rules = headered.rules()?;
        let pdu = Arc::clone(&headered.pdu);
        let event_id = pdu.event_id.as_ref().to_owned();

        // Outliers carry no extra information that would warrant a
        // re-processing, so skip ones we already have. Room versions with
        // server-assigned event ids additionally need a reference hash
        // compare: the same id can name a different event.
        if input.kind == InputKind::Outlier {
            if let Some(existing) = self.db.event_from_id(&pdu.event_id)? {
                let same_event = match headered.room_version {
                    RoomVersionId::V1 | RoomVersionId::V2 => {
                        existing.hashes.sha256 == pdu.hashes.sha256
                    }
                    _ => true,
                };
                if same_event {
                    info!("Already processed event; ignoring");
                    return Ok(ProcessedEvent {
                        event_id,
                        rejection: None,
                    });
                }
            }
        }

        // Make sure every auth ancestor of the event is stored locally,
        // fetching over federation if needed.
        let mut auth_nid_cache = HashMap::new();
        if let Err(e) = self
            .check_for_missing_auth_events(headered, &mut auth_nid_cache)
            .await
        {
            error!("Failed to resolve missing auth events: {}", e);
            return Err(e);
        }

        // Check that the event passes authentication against its declared
        // auth events and work out their numeric ids. Rejection is not an
        // error: the event is persisted either way.
        let declared_auth_ids: Vec<OwnedEventId> = if input.auth_event_ids.is_empty() {
            pdu.auth_events.iter().map(|id| id.as_ref().to_owned()).collect()
        } else {
            input.auth_event_ids.clone()
        };
        let (auth_event_nids, rejection) =
            event_auth::check_auth_events(self.db, headered, &declared_auth_ids)?;
        let is_rejected = rejection.is_some();
        if let Some(reason) = &rejection {
            warn!(auth_event_ids = ?declared_auth_ids, "Rejecting event: {}", reason);
        }

        self.check_for_missing_prev_events(&input)?;

        // An event that is valid against its declared auth events may
        // still be disallowed under current room state; such events are
        // stored but never amplified.
        let mut soft_fail = false;
        if input.kind == InputKind::New {
            match event_auth::check_for_soft_fail(self.db, headered, &input.state_event_ids) {
                Ok(verdict) => soft_fail = verdict,
                Err(e) => info!(kind = ?pdu.kind, "Error authing soft-failed event: {}", e),
            }
        }

        let stored = self
            .db
            .store_event(&pdu, &headered.room_version, &auth_event_nids, is_rejected)?;
        let mut state_at_event = stored.state_at_event;
        let mut event = (*pdu).clone();

        // If storing this event paired it as the target of a known
        // redaction, continue with the redacted projection and make it
        // durable before anyone is notified.
        if !is_rejected && stored.redacted_event_id.as_deref() == Some(event.event_id.as_ref()) {
            let redaction = stored.redaction_pdu.clone().ok_or_else(|| {
                Error::bad_database("Redaction pairing reported without its redaction event")
            })?;
            event.redact(rules.redaction.clone(), &redaction)?;
            self.db.replace_event(stored.event_nid, &event)?;
        }

        // Outliers have no state to store and nobody to notify.
        if input.kind == InputKind::Outlier {
            debug!(kind = ?event.kind, sender = %event.sender, "Stored outlier");
            return Ok(ProcessedEvent {
                event_id,
                rejection: None,
            });
        }

        let room_info = self
            .db
            .room_info(&event.room_id)?
            .ok_or_else(|| Error::UnknownRoom(event.room_id.clone()))?;

        if state_at_event.before_state_snapshot_nid.is_none() {
            let calculated = self.state.calculate_and_set_state(
                &input,
                &room_info,
                &mut state_at_event,
                &event,
                is_rejected,
            );
            if let Err(e) = calculated {
                // Backfilled history may reference prev events whose
                // state never becomes known; the event stays stored.
                if input.kind != InputKind::Old {
                    return Err(e);
                }
                warn!("Failed to calculate state before backfilled event: {}", e);
            }
        }

        // We've stored the event but won't update forward extremities or
        // notify anyone about it.
        if is_rejected || soft_fail {
            debug!(soft_fail, sender = %event.sender, "Stored rejected event");
            return Ok(ProcessedEvent {
                event_id,
                rejection,
            });
        }

        match input.kind {
            InputKind::New => {
                self.update_latest_events(&input, &room_info, &state_at_event, &event)?;
            }
            InputKind::Old => {
                self.output.write_output_events(
                    &event.room_id,
                    vec![OutputRoomEvent::OldRoomEvent {
                        event: headered.clone(),
                    }],
                )?;
            }
            InputKind::Outlier => unreachable!("outliers returned above"),
        }

        // Storing this event may have completed a redaction pairing (in
        // either direction). Both sides are durable by now, so tell the
        // output log about it.
        if let Some(redacted_event_id) = stored.redacted_event_id.clone() {
            let redaction = stored.redaction_pdu.clone().ok_or_else(|| {
                Error::bad_database("Redaction pairing reported without its redaction event")
            })?;
            self.output.write_output_events(
                &event.room_id,
                vec![OutputRoomEvent::RedactedEvent {
                    redacted_event_id,
                    redacted_because: HeaderedPdu {
                        room_version: headered.room_version.clone(),
                        pdu: redaction,
                    },
                }],
            )?;
        }

        Ok(ProcessedEvent {
            event_id,
            rejection,
        })
    }
}
