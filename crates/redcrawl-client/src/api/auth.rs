//! Account endpoints.

use serde::{Deserialize, Serialize};

use super::Message;
use crate::client::ApiClient;
use crate::error::ClientResult;
use crate::tokens::TokenPair;
use crate::transport::ApiRequest;

pub const TOKEN_PATH: &str = "/auth/token";
pub const ME_PATH: &str = "/auth/me";
pub const REGISTER_PATH: &str = "/auth/register";

/// The signed-in operator as reported by `/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Exchange credentials for a token pair (form-encoded, OAuth2 password flow).
    ///
    /// Does not store the pair.
    pub async fn issue_token(&self, username: &str, password: &str) -> ClientResult<TokenPair> {
        let request =
            ApiRequest::post(TOKEN_PATH).with_form(&[("username", username), ("password", password)]);
        self.client.execute_json(request).await
    }

    pub async fn me(&self) -> ClientResult<User> {
        self.client.execute_json(ApiRequest::get(ME_PATH)).await
    }

    pub async fn register(&self, request: &RegisterRequest) -> ClientResult<Message> {
        let request = ApiRequest::post(REGISTER_PATH).with_json(request)?;
        self.client.execute_json(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use crate::tokens::MemoryTokenStore;
    use crate::transport::RequestBody;
    use reqwest::Method;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_issue_token_posts_form() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(
            Method::POST,
            TOKEN_PATH,
            200,
            json!({"access_token": "a", "refresh_token": "r", "token_type": "bearer"}),
        );
        let client = ApiClient::new(transport.clone(), Arc::new(MemoryTokenStore::new()));

        let pair = client.auth().issue_token("ops", "s3cret").await.unwrap();
        assert_eq!(pair, TokenPair::new("a", "r"));

        let sent = transport.requests();
        assert_eq!(
            sent[0].body,
            RequestBody::Form(vec![
                ("username".to_string(), "ops".to_string()),
                ("password".to_string(), "s3cret".to_string()),
            ])
        );
    }

    #[tokio::test]
    async fn test_me_decodes_user() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(
            Method::GET,
            ME_PATH,
            200,
            json!({"id": 4, "username": "ops", "email": "ops@example.com", "is_verified": true, "is_admin": false}),
        );
        let client = ApiClient::new(transport, Arc::new(MemoryTokenStore::with_tokens("a", "r")));

        let user = client.auth().me().await.unwrap();
        assert_eq!(user.username, "ops");
        assert!(user.is_verified);
        assert!(!user.is_admin);
    }

    #[tokio::test]
    async fn test_register_reports_duplicate() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(Method::POST, REGISTER_PATH, 400, json!({"detail": "Username already taken."}));
        let client = ApiClient::new(transport, Arc::new(MemoryTokenStore::new()));

        let err = client
            .auth()
            .register(&RegisterRequest {
                username: "ops".to_string(),
                email: "ops@example.com".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 400: Username already taken.");
    }
}
