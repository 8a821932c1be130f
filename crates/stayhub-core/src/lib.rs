//! `StayHub` Core Library
//!
//! Shared functionality for `StayHub` components:
//! - Domain models for bookings, chats, listings and users
//! - Cancellation policy engine
//! - Authenticated-user session with explicit lifecycle
//! - Configuration resolution and hierarchy
//! - Common error types

pub mod config;
pub mod error;
pub mod models;
pub mod policy;
pub mod session;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
pub use policy::{CancellationPolicy, CancellationQuote, Clock, FixedClock, SystemClock};
pub use session::Session;
