//! HTTP execution provider for the sandbox relay.
//!
//! Provides:
//! - `SandboxProvider` - Run prompts in remote sandbox contexts
//! - `ProviderConfig` - Connection details and resource limits

pub mod client;

pub use client::{ProviderConfig, SandboxProvider};
