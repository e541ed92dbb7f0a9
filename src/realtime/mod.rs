//! Real-time channel integration: subscription lifecycle and push decoding.

pub mod auth;
pub mod bridge;
pub mod loopback;
pub mod router;
pub mod status_tracker;
pub mod topic;
pub mod transport;
pub mod wire;

/// Returns the realtime module name for smoke checks.
pub fn module_name() -> &'static str {
    "realtime"
}
