//! Booking endpoints, including cancellation.

use reqwest::Method;
use tracing::info;

use stayhub_core::models::{
    Booking, CancelBookingRequest, CancelBookingResponse, NewBooking, NewGuest,
};

use super::{ApiClient, ApiError};

impl ApiClient {
    /// Bookings made by `user_id` as a guest.
    pub async fn bookings_for_user(&self, user_id: i64) -> Result<Vec<Booking>, ApiError> {
        self.get(&format!("/bookings/bookingUser/{user_id}")).await
    }

    pub async fn create_booking(&self, booking: &NewBooking) -> Result<Booking, ApiError> {
        self.send_json(Method::POST, "/bookings", booking).await
    }

    pub async fn add_guest(&self, guest: &NewGuest) -> Result<(), ApiError> {
        self.send_json_unit(Method::POST, "/bookings/guests", guest)
            .await
    }

    /// Cancel a booking with the refund computed by the policy engine.
    pub async fn cancel_booking(
        &self,
        booking_id: i64,
        request: &CancelBookingRequest,
    ) -> Result<CancelBookingResponse, ApiError> {
        let response: CancelBookingResponse = self
            .send_json(
                Method::POST,
                &format!("/bookings/{booking_id}/cancel"),
                request,
            )
            .await?;
        info!(
            booking_id,
            refund = request.refund_amount,
            cancelled_by = request.cancelled_by,
            "Booking cancelled"
        );
        Ok(response)
    }
}
