// =============================================================================
// Eventide Matrix Homeserver - Federation Fetcher Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Request/reply contract for fetching auth-chain events from remote
//   servers. The transport behind it is someone else's problem; peers
//   may return a superset of the requested auth chain and the caller
//   must sort and validate what comes back.
//
// =============================================================================

use async_trait::async_trait;
use ruma::{EventId, RoomId};

use crate::{service::pdu::HeaderedPdu, Result};

/// A candidate auth chain for one `(room, event)` pair.
#[derive(Clone, Debug)]
pub struct QueryEventAuthResponse {
    pub events: Vec<HeaderedPdu>,
}

#[async_trait]
pub trait Data: Send + Sync {
    /// Ask the federation for the auth chain of the given event.
    /// Deadlines come from the caller's context; failures are transient
    /// and surfaced unchanged.
    async fn query_event_auth(
        &self,
        room_id: &RoomId,
        event_id: &EventId,
    ) -> Result<QueryEventAuthResponse>;
}

pub struct Service {
    pub db: &'static dyn Data,
}

impl Service {
    pub async fn query_event_auth(
        &self,
        room_id: &RoomId,
        event_id: &EventId,
    ) -> Result<QueryEventAuthResponse> {
        self.db.query_event_auth(room_id, event_id).await
    }
}
