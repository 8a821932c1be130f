//! Booking records and their lifecycle.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::payment::Payment;
use crate::error::{Error, Result};

coded_enum! {
    /// Booking lifecycle state.
    pub enum BookingStatus: "booking status" {
        Pending = 0,
        Paying = 1,
        Paid = 2,
        Cancelled = 3,
        Completed = 4,
    }
}

impl BookingStatus {
    /// Whether the lifecycle permits moving from `self` to `next`.
    ///
    /// Cancelled and Completed are terminal.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paying | Self::Paid | Self::Cancelled)
                | (Self::Paying, Self::Paid | Self::Cancelled)
                | (Self::Paid, Self::Cancelled | Self::Completed)
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paying => "paying",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

/// A reservation of a listing for a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    pub listing_id: i64,
    pub booking_user_id: i64,
    pub host_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub guest_count: u32,
    pub total_amount: f64,
    #[serde(default)]
    pub paid_amount: f64,
    #[serde(default)]
    pub discount_amount: f64,
    pub status: BookingStatus,
}

impl Booking {
    /// Check-in instant: midnight UTC of the start date.
    pub fn check_in(&self) -> DateTime<Utc> {
        self.start_date.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// Number of nights between check-in and check-out.
    pub fn nights(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// States in which either party may still cancel.
    pub const fn is_cancellable(&self) -> bool {
        matches!(
            self.status,
            BookingStatus::Pending | BookingStatus::Paying | BookingStatus::Paid
        )
    }

    /// Move to `next`, enforcing the lifecycle.
    pub fn transition_to(&mut self, next: BookingStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        tracing::debug!(
            booking_id = self.id,
            from = self.status.as_str(),
            to = next.as_str(),
            "Booking status changed"
        );
        self.status = next;
        Ok(())
    }

    /// Whether `user_id` is the host of this booking.
    pub const fn is_host(&self, user_id: i64) -> bool {
        self.host_id == user_id
    }
}

/// Body for `POST /bookings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub listing_id: i64,
    pub booking_user_id: i64,
    pub host_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub guest_count: u32,
    pub total_amount: f64,
}

/// Body for `POST /bookings/guests`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGuest {
    pub booking_id: i64,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,
}

/// Why a booking is being cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    // Host side
    DatesUnavailable,
    PropertyNotSuitable,
    // Guest side
    ChangeOfPlans,
    FoundAlternative,
    AccommodationNotSuitable,
    Other(String),
}

impl CancelReason {
    /// Reasons offered to a host declining a booking.
    pub const HOST: [&'static str; 3] = ["dates unavailable", "property not suitable", "other reason"];
    /// Reasons offered to a guest cancelling a trip.
    pub const GUEST: [&'static str; 4] = [
        "change of plans",
        "found alternative",
        "accommodation not suitable",
        "other reason",
    ];

    /// Parse a reason keyword; `other reason` takes free text in `detail`.
    pub fn parse(value: &str, detail: Option<&str>) -> Option<Self> {
        match value {
            "dates unavailable" => Some(Self::DatesUnavailable),
            "property not suitable" => Some(Self::PropertyNotSuitable),
            "change of plans" => Some(Self::ChangeOfPlans),
            "found alternative" => Some(Self::FoundAlternative),
            "accommodation not suitable" => Some(Self::AccommodationNotSuitable),
            "other reason" | "other" => Some(Self::Other(detail.unwrap_or_default().to_string())),
            _ => None,
        }
    }

    /// The string the API stores as `cancelReason`.
    pub fn to_api_string(&self) -> String {
        match self {
            Self::DatesUnavailable => "dates unavailable".into(),
            Self::PropertyNotSuitable => "property not suitable".into(),
            Self::ChangeOfPlans => "change of plans".into(),
            Self::FoundAlternative => "found alternative".into(),
            Self::AccommodationNotSuitable => "accommodation not suitable".into(),
            Self::Other(text) => format!("other reason: {text}"),
        }
    }
}

/// Body for `POST /bookings/{id}/cancel`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBookingRequest {
    pub cancel_reason: String,
    pub refund_amount: f64,
    pub cancelled_by: i64,
}

/// Response of a cancellation: the updated booking and its payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelBookingResponse {
    #[serde(rename = "bookingVO")]
    pub booking: Option<Booking>,
    #[serde(rename = "paymentVO")]
    pub payment: Option<Payment>,
}
