//! Listing search, detail, availability and review endpoints.

use chrono::NaiveDate;
use reqwest::Method;

use stayhub_core::models::{Availability, Listing, ListingSearch, Review};

use super::{ApiClient, ApiError, query_string};

impl ApiClient {
    pub async fn search_listings(&self, search: &ListingSearch) -> Result<Vec<Listing>, ApiError> {
        self.send_json(Method::POST, "/listings/search", search)
            .await
    }

    pub async fn listing(&self, listing_id: i64) -> Result<Listing, ApiError> {
        self.get(&format!("/listings/{listing_id}")).await
    }

    /// Whether the listing is free between `check_in` and `check_out`.
    pub async fn availability(
        &self,
        listing_id: i64,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Availability, ApiError> {
        let query = query_string(&[
            ("checkIn", Some(check_in.to_string())),
            ("checkOut", Some(check_out.to_string())),
        ]);
        self.get(&format!("/listings/{listing_id}/availability{query}"))
            .await
    }

    pub async fn recommended_listings(&self, limit: Option<u32>) -> Result<Vec<Listing>, ApiError> {
        let query = query_string(&[("limit", limit.map(|l| l.to_string()))]);
        self.get(&format!("/listings/recommended{query}")).await
    }

    pub async fn host_listings(&self, host_id: i64) -> Result<Vec<Listing>, ApiError> {
        self.get(&format!("/listings/landlord/{host_id}")).await
    }

    pub async fn listing_reviews(&self, listing_id: i64) -> Result<Vec<Review>, ApiError> {
        self.get(&format!("/reviews/listings/{listing_id}")).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::tests::test_client;
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn listing_json(id: i64, policy: i64) -> serde_json::Value {
        json!({
            "id": id, "hostId": 9, "title": "Loft", "price": 120.0,
            "cancelPolicy": policy
        })
    }

    #[tokio::test]
    async fn listing_detail_carries_policy_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings/3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"code": 200, "data": listing_json(3, 2)})),
            )
            .mount(&server)
            .await;

        let listing = test_client(&server.uri()).listing(3).await.unwrap();
        assert_eq!(listing.cancel_policy, 2);
        assert_eq!(listing.host_id, 9);
    }

    #[tokio::test]
    async fn availability_sends_dates_as_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings/3/availability"))
            .and(query_param("checkIn", "2025-05-01"))
            .and(query_param("checkOut", "2025-05-04"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "data": {"available": false, "unavailableDates": ["2025-05-02"]}
            })))
            .mount(&server)
            .await;

        let availability = test_client(&server.uri())
            .availability(
                3,
                NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 5, 4).unwrap(),
            )
            .await
            .unwrap();
        assert!(!availability.available);
        assert_eq!(availability.unavailable_dates.len(), 1);
    }

    #[tokio::test]
    async fn search_posts_only_set_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/listings/search"))
            .and(body_json(json!({"location": "Shanghai", "guests": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "data": [listing_json(1, 0), listing_json(2, 1)]
            })))
            .mount(&server)
            .await;

        let search = ListingSearch {
            location: Some("Shanghai".into()),
            guests: Some(2),
            ..Default::default()
        };
        let results = test_client(&server.uri())
            .search_listings(&search)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn recommended_passes_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings/recommended"))
            .and(query_param("limit", "4"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"code": 200, "data": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let results = test_client(&server.uri())
            .recommended_listings(Some(4))
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
