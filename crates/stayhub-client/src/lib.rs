//! `StayHub` Client Library
//!
//! Everything that talks to the marketplace backend:
//! - REST client for the `{ code, message, data }` API
//! - Real-time pub/sub channel (STOMP frames over WebSocket) with
//!   automatic reconnection
//! - Chat synchronization: optimistic sends, reconciliation of server
//!   echoes, read-state tracking

pub mod api;
pub mod chat;
pub mod realtime;

pub use api::{ApiClient, ApiError};
pub use chat::{ChatConfig, ChatError, ChatEvent, ChatHandle, ChatSync, ChatSyncTask};
pub use realtime::{ConnectionState, RealtimeClient, RealtimeConfig, RealtimeError};
