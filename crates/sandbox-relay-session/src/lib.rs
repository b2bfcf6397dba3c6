//! Session tracking and message routing for the sandbox relay.
//!
//! Provides:
//! - `SessionStore` - In-memory thread-to-session map with expiry sweeps
//! - `Router` - Classify inbound messages and drive session execution

pub mod router;
pub mod store;

pub use router::{Router, RouterError, START_FAILED_NOTICE, STARTING_NOTICE, THINKING_NOTICE};
pub use store::{SESSION_EXPIRY_MS, SessionStore, spawn_expiry_sweep, SWEEP_INTERVAL};
