// =============================================================================
// Eventide Matrix Homeserver - Library Crate
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   The room event ingestion pipeline of the Eventide Matrix homeserver:
//   authenticates, orders, stores, de-duplicates and materializes room
//   state for events submitted by clients and remote servers, while
//   preserving the cryptographic and causal guarantees of the federation
//   protocol. Transports, the storage engine and the output publication
//   layer plug in through the typed contracts under `service`.
//
// =============================================================================

use serde::{Deserialize, Serialize};

pub mod metrics;
pub mod service;
pub mod utils;

// Re-export common types
pub use ruma;
pub use tokio;
pub use tracing;

pub use metrics::Metrics;
pub use service::{
    pdu::{EventHash, HeaderedPdu, PduEvent},
    rooms::{
        input::ProcessedEvent,
        output::OutputRoomEvent,
        types::{InputKind, InputRoomEvent},
    },
};
pub use utils::error::{Error, Result};

/// Configuration for the ingestion core.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// The server name local users belong to; used to decide whether a
    /// caller-supplied state overwrite applies.
    pub server_name: ruma::OwnedServerName,

    /// Deadline for federation auth-chain fetches, in seconds.
    pub federation_timeout_s: Option<u64>,

    /// Logging filter, e.g. "info" or "eventide=debug".
    pub log: String,
}

impl Config {
    pub fn federation_timeout_s(&self) -> u64 {
        self.federation_timeout_s.unwrap_or(30)
    }
}
