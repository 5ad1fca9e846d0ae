//! Account flows: login, registration, logout.
//!
//! Login stores the issued JWT and the full `data` object of the response in
//! the session; logout removes both.

use super::client::{ApiClient, RequestBody, RequestOptions};
use super::error::ApiError;
use super::resources::read_envelope;
use super::types::{AuthData, LoginRequest, RegisterRequest};
use crate::session::Session;

/// Authenticate with email and password and persist the new session.
///
/// Any previous session is cleared first so a stale token cannot block the
/// login request itself.
pub async fn login(
    client: &ApiClient,
    session: &Session,
    email: &str,
    password: &str,
) -> Result<AuthData, ApiError> {
    log::info!("Logging in as {}", email);
    session.clear()?;

    let body = RequestBody::json(&LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    })?;
    let resp = client
        .post("/Account/Authentication", Some(body), RequestOptions::default())
        .await?;

    let data: serde_json::Value = read_envelope(resp).await?.into_data()?;
    let has_token = data["jwToken"].as_str().is_some_and(|t| !t.is_empty());
    if !has_token {
        return Err(ApiError::MissingToken);
    }
    let auth: AuthData =
        serde_json::from_value(data).map_err(|e| ApiError::Decode(e.to_string()))?;

    session.establish(&auth.jw_token, &auth)?;
    log::info!("Login successful for {}", auth.display_name().unwrap_or(email));
    Ok(auth)
}

/// Create an account. Passwords must match before anything is sent.
pub async fn register(client: &ApiClient, request: &RegisterRequest) -> Result<(), ApiError> {
    if request.password != request.comfirm_password {
        return Err(ApiError::PasswordMismatch);
    }

    let resp = client
        .post(
            "/Account/RegisterUser",
            Some(RequestBody::json(request)?),
            RequestOptions::default(),
        )
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Status { status, body });
    }
    log::info!("Registered user {}", request.user_name);
    Ok(())
}

/// Drop the local session. Nothing is sent to the backend.
pub fn logout(session: &Session) -> Result<(), ApiError> {
    session.clear()?;
    log::info!("Logout complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::session::token::token_expiring_in;
    use crate::session::{MemoryStore, SessionStore, SNAPSHOT_KEY, TOKEN_KEY};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, ApiClient, Arc<Session>, Arc<MemoryStore>) {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        let session = Arc::new(Session::new(store.clone(), "/login"));
        let client = ApiClient::with_session(&format!("{}/api", server.uri()), session.clone());
        (server, client, session, store)
    }

    #[tokio::test]
    async fn test_login_stores_token_and_snapshot() {
        let (server, client, session, store) = setup().await;
        let token = token_expiring_in(3600);
        Mock::given(method("POST"))
            .and(path("/api/Account/Authentication"))
            .and(body_json(json!({ "email": "admin@fbstore.com", "password": "pw" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "jwToken": token, "userName": "admin", "email": "admin@fbstore.com" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = login(&client, &session, "admin@fbstore.com", "pw").await.unwrap();

        assert_eq!(auth.jw_token, token);
        assert_eq!(store.get(TOKEN_KEY).unwrap(), Some(token.clone()));
        let snapshot: serde_json::Value =
            serde_json::from_str(&store.get(SNAPSHOT_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(snapshot["userName"], "admin");
        assert_eq!(snapshot["jwToken"], token);
    }

    #[tokio::test]
    async fn test_login_replaces_expired_session() {
        let (server, client, session, store) = setup().await;
        store.set(TOKEN_KEY, &token_expiring_in(-60)).unwrap();
        let fresh = token_expiring_in(3600);
        Mock::given(method("POST"))
            .and(path("/api/Account/Authentication"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "jwToken": fresh }
            })))
            .expect(1)
            .mount(&server)
            .await;

        login(&client, &session, "a@b.c", "pw").await.unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), Some(fresh));
    }

    #[tokio::test]
    async fn test_login_without_token_stores_nothing() {
        let (server, client, session, store) = setup().await;
        Mock::given(method("POST"))
            .and(path("/api/Account/Authentication"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "userName": "admin" }
            })))
            .mount(&server)
            .await;

        let err = login(&client, &session, "a@b.c", "pw").await.unwrap_err();
        assert!(matches!(err, ApiError::MissingToken));
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(store.get(SNAPSHOT_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_login_rejected_by_backend() {
        let (server, client, session, store) = setup().await;
        Mock::given(method("POST"))
            .and(path("/api/Account/Authentication"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "message": "Invalid credentials"
            })))
            .mount(&server)
            .await;

        let err = login(&client, &session, "a@b.c", "wrong").await.unwrap_err();
        assert!(matches!(err, ApiError::Rejected(ref m) if m == "Invalid credentials"));
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
    }

    fn register_request(confirm: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: "An".into(),
            last_name: "Nguyen".into(),
            email: "an@example.com".into(),
            user_name: "an".into(),
            gender: None,
            password: "secret".into(),
            comfirm_password: confirm.into(),
            phone_number: "0900000000".into(),
        }
    }

    #[tokio::test]
    async fn test_register_password_mismatch_sends_nothing() {
        let (server, client, _, _) = setup().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = register(&client, &register_request("other")).await.unwrap_err();
        assert!(matches!(err, ApiError::PasswordMismatch));
    }

    #[tokio::test]
    async fn test_register_posts_account() {
        let (server, client, _, _) = setup().await;
        Mock::given(method("POST"))
            .and(path("/api/Account/RegisterUser"))
            .and(body_json(json!({
                "firstName": "An",
                "lastName": "Nguyen",
                "email": "an@example.com",
                "userName": "an",
                "gender": null,
                "password": "secret",
                "comfirmPassword": "secret",
                "phoneNumber": "0900000000"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        register(&client, &register_request("secret")).await.unwrap();
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let (_server, _client, session, store) = setup().await;
        session
            .establish(&token_expiring_in(3600), &json!({ "userName": "admin" }))
            .unwrap();

        logout(&session).unwrap();

        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(store.get(SNAPSHOT_KEY).unwrap(), None);
    }
}
