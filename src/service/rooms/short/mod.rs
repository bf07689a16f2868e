// =============================================================================
// Eventide Matrix Homeserver - Interning Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Service facade over the state-key tuple interning contract. Event and
//   room NIDs are allocated by `timeline::Data::store_event`; this module
//   covers the remaining interned dimension, the `(type, state_key)`
//   tuples that snapshot entries are keyed on.
//
// =============================================================================

mod data;

pub use data::Data;
use ruma::events::StateEventType;

use crate::{service::rooms::types::StateKeyTupleNid, Result};

pub struct Service {
    pub db: &'static dyn Data,
}

impl Service {
    pub fn get_or_create_state_key_nid(
        &self,
        event_type: &StateEventType,
        state_key: &str,
    ) -> Result<StateKeyTupleNid> {
        self.db.get_or_create_state_key_nid(event_type, state_key)
    }

    pub fn get_state_key_from_nid(
        &self,
        nid: StateKeyTupleNid,
    ) -> Result<(StateEventType, String)> {
        self.db.get_state_key_from_nid(nid)
    }
}
