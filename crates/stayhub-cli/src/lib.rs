//! `StayHub` CLI Library
//!
//! Terminal front end for the marketplace: sign in, review bookings and
//! cancellation refunds, and follow chats live.

pub mod auth_cmd;
pub mod booking_cmd;
pub mod chat_cmd;
pub mod context;
pub mod fmt;
