// =============================================================================
// Eventide Matrix Homeserver - Rooms Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Room-scoped services of the ingestion core and the aggregate data
//   contract the store must satisfy. The store enforces its own locking
//   and transaction discipline; services only mutate room state through
//   it.
//
// =============================================================================

pub mod event_auth;
pub mod input;
pub mod output;
pub mod short;
pub mod state;
pub mod timeline;
pub mod types;

use crate::{metrics::Metrics, service::federation};

/// The full typed contract over the event/state database consumed by the
/// ingestion core.
pub trait Data: short::Data + state::Data + timeline::Data {}

impl<T: short::Data + state::Data + timeline::Data> Data for T {}

pub struct Service {
    pub input: input::Service,
    pub output: output::Service,
    pub short: short::Service,
    pub state: state::Service,
    pub timeline: timeline::Service,
}

impl Service {
    /// Wire the room services over one store, one federation client and
    /// one output sink.
    pub fn build<D>(
        db: &'static D,
        federation: &'static dyn federation::Data,
        output_sink: &'static dyn output::Data,
        metrics: Metrics,
    ) -> Self
    where
        D: Data + Sized,
    {
        Self {
            input: input::Service::new(db, federation, output_sink, metrics),
            output: output::Service { db: output_sink },
            short: short::Service { db },
            state: state::Service { db },
            timeline: timeline::Service { db },
        }
    }
}
