//! Service layer: session lifecycle, score reconciliation, realtime dispatch,
//! background maintenance.

pub mod documentation;
pub mod events;
pub mod health_service;
pub mod score_service;
pub mod session_service;
pub mod session_sweeper;
#[cfg(feature = "mongo-store")]
pub mod storage_supervisor;
pub mod websocket_service;
