// =============================================================================
// Eventide Matrix Homeserver - Interning Data Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// =============================================================================

use ruma::events::StateEventType;

use crate::{service::rooms::types::StateKeyTupleNid, Result};

/// Durable, monotonic interning of `(event type, state key)` tuples.
pub trait Data: Send + Sync {
    /// Intern the tuple, allocating a new NID on first sight.
    fn get_or_create_state_key_nid(
        &self,
        event_type: &StateEventType,
        state_key: &str,
    ) -> Result<StateKeyTupleNid>;

    /// Reverse lookup for snapshot materialization.
    fn get_state_key_from_nid(&self, nid: StateKeyTupleNid) -> Result<(StateEventType, String)>;
}
