//! Core abstractions for the sandbox relay.
//!
//! This crate provides the fundamental building blocks:
//! - `Session`, `InboundMessage` and the execution request/result types
//! - `ChatGateway` and `ExecutionProvider` trait boundaries
//! - Thread-title derivation and relay-text formatting

pub mod execution;
pub mod format;
pub mod message;
pub mod session;
pub mod title;
pub mod traits;

pub use execution::{ExecutionContext, ExecutionRequest, ExecutionResult};
pub use message::InboundMessage;
pub use session::Session;
pub use traits::{ChatGateway, ExecutionProvider};
