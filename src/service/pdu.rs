// =============================================================================
// Eventide Matrix Homeserver - PDU Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   The persistent event type flowing through the ingestion pipeline and
//   its room-versioned wrapper. A PDU is immutable once created; the only
//   mutation this module offers is the redacted projection, which strips
//   content per room-version redaction rules while recording the reason
//   in the unsigned section.
//
// Dependencies:
//   • Matrix protocol types with ruma
//   • Serialization with serde
//   • Structured logging with tracing
//
// =============================================================================

use std::{cmp::Ordering, sync::Arc};

use ruma::{
    canonical_json::redact_content_in_place,
    events::TimelineEventType,
    room_version_rules::{RedactionRules, RoomVersionRules},
    state_res, EventId, MilliSecondsSinceUnixEpoch, OwnedRoomId, OwnedUserId, RoomId,
    RoomVersionId, UInt, UserId,
};
use serde::{Deserialize, Serialize};
use serde_json::{
    json,
    value::{to_raw_value, RawValue as RawJsonValue},
};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Content hashes of a PDU.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventHash {
    /// The SHA-256 reference hash.
    pub sha256: String,
}

impl EventHash {
    pub fn new(sha256: String) -> Result<Self> {
        if sha256.len() != 64 || !sha256.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::BadEvent("Invalid SHA-256 hash format".to_string()));
        }
        Ok(EventHash { sha256 })
    }
}

#[derive(Clone, Deserialize, Debug, Serialize)]
pub struct PduEvent {
    pub event_id: Arc<EventId>,
    pub room_id: OwnedRoomId,
    pub sender: OwnedUserId,
    pub origin_server_ts: UInt,
    #[serde(rename = "type")]
    pub kind: TimelineEventType,
    pub content: Box<RawJsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    pub prev_events: Vec<Arc<EventId>>,
    pub depth: UInt,
    pub auth_events: Vec<Arc<EventId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redacts: Option<Arc<EventId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsigned: Option<Box<RawJsonValue>>,
    pub hashes: EventHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures: Option<Box<RawJsonValue>>,
}

impl PduEvent {
    /// Produce the redacted projection of this event in place.
    ///
    /// The original body stays addressable in the store; callers persist
    /// the projection through `timeline::Data::replace_event` so both
    /// sides of a redaction pairing are durable before anyone is told.
    pub fn redact(&mut self, redaction_rules: RedactionRules, reason: &PduEvent) -> Result<()> {
        if reason.kind != TimelineEventType::RoomRedaction {
            return Err(Error::BadEvent(
                "Redaction reason must be a redaction event".to_string(),
            ));
        }

        if self.is_redacted() {
            warn!("⚠️ Event {} is already redacted", self.event_id);
            return Ok(());
        }

        self.unsigned = None;

        let mut content = serde_json::from_str(self.content.get())
            .map_err(|_| Error::bad_database("PDU in db has invalid content."))?;

        redact_content_in_place(&mut content, &redaction_rules, self.kind.to_string())
            .map_err(|e| Error::Redaction(self.sender.server_name().to_owned(), e.to_string()))?;

        self.unsigned = Some(
            to_raw_value(&json!({
                "redacted_because": serde_json::to_value(reason).expect("to_value(PduEvent) always works")
            }))
            .expect("to raw value always works"),
        );

        self.content = to_raw_value(&content).expect("to raw value always works");

        debug!("✅ Redacted event {}", self.event_id);
        Ok(())
    }

    pub fn is_redacted(&self) -> bool {
        #[derive(Deserialize)]
        struct ExtractRedactedBecause {
            redacted_because: Option<serde::de::IgnoredAny>,
        }

        let Some(unsigned) = &self.unsigned else {
            return false;
        };

        let Ok(unsigned) = ExtractRedactedBecause::deserialize(&**unsigned) else {
            return false;
        };

        unsigned.redacted_because.is_some()
    }
}

impl state_res::Event for PduEvent {
    type Id = Arc<EventId>;

    fn event_id(&self) -> &Self::Id {
        &self.event_id
    }

    fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    fn sender(&self) -> &UserId {
        &self.sender
    }

    fn event_type(&self) -> &TimelineEventType {
        &self.kind
    }

    fn content(&self) -> &RawJsonValue {
        &self.content
    }

    fn origin_server_ts(&self) -> MilliSecondsSinceUnixEpoch {
        MilliSecondsSinceUnixEpoch(self.origin_server_ts)
    }

    fn state_key(&self) -> Option<&str> {
        self.state_key.as_deref()
    }

    fn prev_events(&self) -> Box<dyn DoubleEndedIterator<Item = &Self::Id> + '_> {
        Box::new(self.prev_events.iter())
    }

    fn auth_events(&self) -> Box<dyn DoubleEndedIterator<Item = &Self::Id> + '_> {
        Box::new(self.auth_events.iter())
    }

    fn redacts(&self) -> Option<&Self::Id> {
        self.redacts.as_ref()
    }
}

// These impl's allow us to dedup events by id when resolving state for
// incoming events.
impl Eq for PduEvent {}
impl PartialEq for PduEvent {
    fn eq(&self, other: &Self) -> bool {
        self.event_id == other.event_id
    }
}
impl PartialOrd for PduEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PduEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.event_id.cmp(&other.event_id)
    }
}

/// An event paired with the version of the room it belongs to. The room
/// version selects the rules used for auth, redaction, state resolution
/// and event id formatting.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HeaderedPdu {
    pub room_version: RoomVersionId,
    pub pdu: Arc<PduEvent>,
}

impl HeaderedPdu {
    pub fn new(room_version: RoomVersionId, pdu: PduEvent) -> Self {
        Self {
            room_version,
            pdu: Arc::new(pdu),
        }
    }

    /// The rule set for this room version, or an error for versions the
    /// data layer does not support.
    pub fn rules(&self) -> Result<RoomVersionRules> {
        self.room_version
            .rules()
            .ok_or_else(|| Error::UnsupportedRoomVersion(self.room_version.clone()))
    }
}
