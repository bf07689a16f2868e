// =============================================================================
// Eventide Matrix Homeserver - Service Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Service layer of the ingestion core: the room pipeline itself plus
//   the contracts it consumes (store, federation fetcher, output sink).
//
// =============================================================================

pub mod federation;
pub mod pdu;
pub mod rooms;

pub use pdu::{EventHash, HeaderedPdu, PduEvent};
