//! Cancellation policy engine.
//!
//! Computes the refund a booking earns on cancellation from the listing's
//! policy tier and the time left before check-in. Evaluation is pure: the
//! current time comes from a [`Clock`] so callers (and tests) can pin it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Booking, CancelBookingRequest, CancelReason};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Refund tier attached to a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum CancellationPolicy {
    /// Full refund until one day before check-in.
    Flexible = 0,
    /// Full refund until a week before check-in, half after.
    Moderate = 1,
    /// 20% refund until a week before check-in, nothing after.
    Strict = 2,
}

impl TryFrom<i64> for CancellationPolicy {
    type Error = Error;

    fn try_from(code: i64) -> Result<Self> {
        match code {
            0 => Ok(Self::Flexible),
            1 => Ok(Self::Moderate),
            2 => Ok(Self::Strict),
            other => Err(Error::InvalidPolicyTier(other)),
        }
    }
}

impl From<CancellationPolicy> for i64 {
    fn from(policy: CancellationPolicy) -> Self {
        policy as Self
    }
}

impl CancellationPolicy {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Flexible => "flexible",
            Self::Moderate => "moderate",
            Self::Strict => "strict",
        }
    }

    /// Refund percentage for a cancellation `days_until_check_in` days out.
    pub const fn refund_percentage(self, days_until_check_in: i64) -> u8 {
        match self {
            Self::Flexible => {
                if days_until_check_in > 1 {
                    100
                } else {
                    0
                }
            }
            Self::Moderate => {
                if days_until_check_in > 7 {
                    100
                } else {
                    50
                }
            }
            Self::Strict => {
                if days_until_check_in > 7 {
                    20
                } else {
                    0
                }
            }
        }
    }

    /// Quote a cancellation for a stay starting at `check_in`.
    pub fn quote_at(
        self,
        check_in: DateTime<Utc>,
        total_amount: f64,
        now: DateTime<Utc>,
    ) -> CancellationQuote {
        let days = days_until(check_in, now);
        let refund_percentage = self.refund_percentage(days);
        let refund_amount = total_amount * f64::from(refund_percentage) / 100.0;

        CancellationQuote {
            policy: self,
            days_until_check_in: days,
            is_free: refund_percentage == 100,
            refund_percentage,
            refund_amount,
            cancellation_fee: total_amount - refund_amount,
        }
    }

    /// Quote a cancellation of `booking` under this policy.
    pub fn quote_booking(self, booking: &Booking, clock: &impl Clock) -> CancellationQuote {
        self.quote_at(booking.check_in(), booking.total_amount, clock.now())
    }
}

/// Whole days from `now` until `check_in`, rounded up.
///
/// A check-in 36 hours away is 2 days out; one exactly 24 hours away is 1.
pub fn days_until(check_in: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (check_in - now).num_milliseconds();
    let whole = millis.div_euclid(MILLIS_PER_DAY);
    if millis.rem_euclid(MILLIS_PER_DAY) > 0 {
        whole + 1
    } else {
        whole
    }
}

/// Quote from a raw tier code, rejecting codes outside the known tiers.
pub fn quote_for_code(
    code: i64,
    check_in: DateTime<Utc>,
    total_amount: f64,
    clock: &impl Clock,
) -> Result<CancellationQuote> {
    let policy = CancellationPolicy::try_from(code)?;
    Ok(policy.quote_at(check_in, total_amount, clock.now()))
}

/// Outcome of a cancellation quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationQuote {
    pub policy: CancellationPolicy,
    pub days_until_check_in: i64,
    pub is_free: bool,
    pub refund_percentage: u8,
    pub refund_amount: f64,
    pub cancellation_fee: f64,
}

impl CancellationQuote {
    /// Build the cancellation request body carrying this quote's refund.
    pub fn into_request(self, reason: &CancelReason, cancelled_by: i64) -> CancelBookingRequest {
        CancelBookingRequest {
            cancel_reason: reason.to_api_string(),
            refund_amount: self.refund_amount,
            cancelled_by,
        }
    }
}
