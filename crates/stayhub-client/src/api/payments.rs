//! Payment endpoints.

use reqwest::Method;

use stayhub_core::models::{NewPayment, Payment};

use super::{ApiClient, ApiError};

impl ApiClient {
    pub async fn payment_for_booking(&self, booking_id: i64) -> Result<Payment, ApiError> {
        self.get(&format!("/payments/{booking_id}")).await
    }

    pub async fn create_payment(&self, payment: &NewPayment) -> Result<Payment, ApiError> {
        self.send_json(Method::POST, "/payments", payment).await
    }
}
