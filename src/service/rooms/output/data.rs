// =============================================================================
// Eventide Matrix Homeserver - Output Data Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// =============================================================================

use ruma::RoomId;

use crate::Result;

use super::OutputRoomEvent;

/// Downstream notification sink. One totally ordered log per room.
pub trait Data: Send + Sync {
    fn write_output_events(&self, room_id: &RoomId, events: Vec<OutputRoomEvent>) -> Result<()>;
}
