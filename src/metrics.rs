// =============================================================================
// Eventide Matrix Homeserver - Metrics Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Prometheus collectors owned by the ingestion core. Registration
//   happens against a caller-supplied registry; exposing the registry
//   over HTTP is the embedding process's concern.
//
// =============================================================================

use prometheus::{HistogramOpts, HistogramVec, Registry};

use crate::Result;

/// Collectors for the ingestion core. Cloning is cheap and shares the
/// underlying collectors.
#[derive(Clone)]
pub struct Metrics {
    /// How long it takes to process an incoming room event, in
    /// milliseconds, labelled by room.
    pub process_room_event_duration: HistogramVec,
}

impl Metrics {
    pub fn new(registry: &Registry) -> Result<Self> {
        let process_room_event_duration = HistogramVec::new(
            HistogramOpts::new(
                "eventide_roomserver_processroomevent_duration_millis",
                "How long it takes the roomserver to process an event",
            )
            .buckets(vec![
                5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 1000.0, 2000.0, 3000.0, 4000.0,
                5000.0, 6000.0, 7000.0, 8000.0, 9000.0, 10000.0, 15000.0, 20000.0,
            ]),
            &["room_id"],
        )?;
        registry.register(Box::new(process_room_event_duration.clone()))?;

        Ok(Self {
            process_room_event_duration,
        })
    }
}
