//! Two-step drone scan protocol: a rack scan opens a short-lived session,
//! and a follow-up item scan is validated against that rack.

mod engine;
pub mod rules;
mod session_store;

pub use engine::{RackScanAck, ScanEngine, ScanVerdict};
pub use session_store::{ScanSession, ScanSessionStore, SESSION_TTL_SECS};
