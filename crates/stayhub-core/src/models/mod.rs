//! Wire and domain types for the marketplace API.
//!
//! Field names follow the API's `camelCase` JSON. Small enums the API
//! transmits as integers are declared with `coded_enum!` so they
//! (de)serialize as their numeric code.

/// Declare a `#[repr(i64)]`-style enum that travels as an integer code.
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "i64", into = "i64")]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $code ),+
        }

        impl TryFrom<i64> for $name {
            type Error = crate::error::Error;

            fn try_from(code: i64) -> ::core::result::Result<Self, Self::Error> {
                match code {
                    $( $code => Ok(Self::$variant), )+
                    other => Err(crate::error::Error::InvalidCode { kind: $kind, code: other }),
                }
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                value as Self
            }
        }
    };
}


pub mod booking;
pub mod chat;
pub mod envelope;
pub mod listing;
pub mod payment;
pub mod user;

pub use booking::{
    Booking, BookingStatus, CancelBookingRequest, CancelBookingResponse, CancelReason, NewBooking,
    NewGuest,
};
pub use chat::{Chat, ChatMessage, MessageStatus, MessageType, NewChat, ReadReceipt};
pub use envelope::{ApiEnvelope, SUCCESS_CODE};
pub use listing::{Availability, Listing, ListingSearch, Review};
pub use payment::{NewPayment, Payment, PaymentStatus};
pub use user::{Favorite, LoginRequest, RegisterRequest, RoleType, User};
