//! Payments attached to bookings.

use serde::{Deserialize, Serialize};

coded_enum! {
    /// Payment processing state.
    pub enum PaymentStatus: "payment status" {
        Pending = 0,
        Success = 1,
        Failed = 2,
        Refunded = 3,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub booking_id: i64,
    pub amount: f64,
    #[serde(default)]
    pub payment_method: Option<String>,
    pub status: PaymentStatus,
    #[serde(default)]
    pub refund_amount: Option<f64>,
}

/// Body for `POST /payments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub booking_id: i64,
    pub amount: f64,
    pub payment_method: String,
    pub status: PaymentStatus,
}
