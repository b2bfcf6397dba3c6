//! Discord integration for the sandbox relay.
//!
//! Provides:
//! - `GatewayClient` - Websocket connection producing inbound messages
//! - `DiscordApi` - REST client implementing the chat gateway
//! - Wire types for the gateway protocol

pub mod gateway;
pub mod protocol;
pub mod rest;

pub use gateway::{GatewayClient, GatewayClientError};
pub use rest::DiscordApi;
