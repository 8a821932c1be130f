//! Account, profile and favorites endpoints.

use reqwest::Method;
use serde::Serialize;
use tracing::info;

use stayhub_core::models::{Favorite, LoginRequest, RegisterRequest, User};

use super::{ApiClient, ApiError};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordCheck<'a> {
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordChange<'a> {
    old_password: &'a str,
    new_password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteUpdate {
    user_id: i64,
    listing_id: i64,
}

impl ApiClient {
    /// Exchange credentials for a user record carrying a bearer token.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let user: User = self.send_json(Method::POST, "/users/login", &body).await?;
        info!(user_id = user.id, "Login accepted");
        Ok(user)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        self.send_json(Method::POST, "/users/register", request).await
    }

    pub async fn update_profile(&self, user: &User) -> Result<User, ApiError> {
        self.send_json(Method::PUT, &format!("/users/{}", user.id), user)
            .await
    }

    /// Whether `password` matches the stored one.
    pub async fn verify_password(&self, user_id: i64, password: &str) -> Result<bool, ApiError> {
        self.send_json(
            Method::POST,
            &format!("/users/{user_id}/verify-password"),
            &PasswordCheck { password },
        )
        .await
    }

    pub async fn update_password(
        &self,
        user_id: i64,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        self.send_json_unit(
            Method::PUT,
            &format!("/users/{user_id}/password"),
            &PasswordChange {
                old_password,
                new_password,
            },
        )
        .await
    }

    /// Public profile of another user (a chat counterpart, a host).
    pub async fn other_user(&self, user_id: i64) -> Result<User, ApiError> {
        self.get(&format!("/users/otherUser/{user_id}")).await
    }

    pub async fn add_favorite(&self, user_id: i64, listing_id: i64) -> Result<(), ApiError> {
        self.send_json_unit(
            Method::PUT,
            "/users/favorites",
            &FavoriteUpdate {
                user_id,
                listing_id,
            },
        )
        .await
    }

    pub async fn favorites(&self, user_id: i64) -> Result<Vec<Favorite>, ApiError> {
        self.get(&format!("/users/{user_id}/favorites")).await
    }

    pub async fn remove_favorite(&self, user_id: i64, favorite_id: i64) -> Result<(), ApiError> {
        self.execute::<serde_json::Value>(self.request(
            Method::DELETE,
            &format!("/users/{user_id}/favorites/{favorite_id}"),
        ))
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::tests::test_client;
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn login_returns_user_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/users/login"))
            .and(body_json(json!({"email": "lin@example.com", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "message": "ok",
                "data": {
                    "id": 4, "email": "lin@example.com", "roleType": 1, "token": "tok"
                }
            })))
            .mount(&server)
            .await;

        let user = test_client(&server.uri())
            .login("lin@example.com", "pw")
            .await
            .unwrap();
        assert_eq!(user.id, 4);
        assert_eq!(user.token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/users/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 400, "message": "invalid credentials"
            })))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .login("lin@example.com", "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Rejected { code: 400, .. }));
    }

    #[tokio::test]
    async fn favorites_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/users/favorites"))
            .and(body_json(json!({"userId": 4, "listingId": 3})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"code": 200, "data": null})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/users/4/favorites"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "data": [{"id": 11, "listingId": 3, "title": "Loft"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/users/4/favorites/11"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client.add_favorite(4, 3).await.unwrap();
        let favorites = client.favorites(4).await.unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].title.as_deref(), Some("Loft"));
        client.remove_favorite(4, 11).await.unwrap();
    }

    #[tokio::test]
    async fn verify_password_decodes_bool() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/users/4/verify-password"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"code": 200, "data": false})),
            )
            .mount(&server)
            .await;

        let ok = test_client(&server.uri())
            .verify_password(4, "guess")
            .await
            .unwrap();
        assert!(!ok);
    }
}
