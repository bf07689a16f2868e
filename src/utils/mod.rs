// =============================================================================
// Eventide Matrix Homeserver - Utilities Module
// =============================================================================
//
// Project: Eventide - Room Event Ingestion Core
// Author: Liu Wen (liuwen@eventide.chat) - Eventide Project
// Date: 2025-03-18
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Shared helpers for the ingestion core, currently the crate error
//   taxonomy.
//
// =============================================================================

pub mod error;

pub use error::{Error, Result};
