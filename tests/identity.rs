use axum::extract::Json;
use axum::http::{StatusCode, Uri};
use axum::Router;
use serde_json::{json, Value};
use std::net::SocketAddr;
use symposium::registration::auth::AuthFailure;
use symposium::registration::config::IdentityConfig;
use symposium::registration::{FirebaseAuth, IdentityProvider, RegistrationError};

/// Minimal Identity Toolkit: one account, one valid token.
async fn identity_toolkit(uri: Uri, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let path = uri.path();
    if uri.query() != Some("key=test-key") {
        return error(StatusCode::BAD_REQUEST, "API_KEY_INVALID");
    }

    if path.ends_with("accounts:signInWithPassword") {
        return match (body["email"].as_str(), body["password"].as_str()) {
            (Some("admin@zenith.in"), Some("pw")) => (
                StatusCode::OK,
                Json(json!({
                    "localId": "uid-1",
                    "email": "admin@zenith.in",
                    "idToken": "id-token-1",
                    "expiresIn": "3600"
                })),
            ),
            (Some("locked@zenith.in"), _) => error(
                StatusCode::BAD_REQUEST,
                "TOO_MANY_ATTEMPTS_TRY_LATER : Access to this account has been temporarily disabled",
            ),
            _ => error(StatusCode::BAD_REQUEST, "INVALID_LOGIN_CREDENTIALS"),
        };
    }

    if path.ends_with("accounts:lookup") {
        return match body["idToken"].as_str() {
            Some("id-token-1") => (
                StatusCode::OK,
                Json(json!({ "users": [{ "localId": "uid-1", "email": "admin@zenith.in" }] })),
            ),
            _ => error(StatusCode::BAD_REQUEST, "INVALID_ID_TOKEN"),
        };
    }

    error(StatusCode::NOT_FOUND, "NOT_FOUND")
}

fn error(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "error": { "code": status.as_u16(), "message": message } })),
    )
}

async fn spawn_identity_toolkit() -> SocketAddr {
    let app = Router::new().fallback(identity_toolkit);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

fn client(addr: SocketAddr) -> FirebaseAuth {
    FirebaseAuth::new(IdentityConfig {
        api_key: "test-key".to_string(),
        base_url: format!("http://{}/", addr),
    })
}

#[tokio::test]
async fn password_sign_in_returns_the_id_token() {
    let auth = client(spawn_identity_toolkit().await);

    let session = auth.sign_in("admin@zenith.in", "pw").await.unwrap();

    assert_eq!(session.id_token, "id-token-1");
    assert_eq!(session.user.uid, "uid-1");
    assert_eq!(session.user.email.as_deref(), Some("admin@zenith.in"));
    assert_eq!(session.expires_in, 3600);
}

#[tokio::test]
async fn provider_errors_become_login_messages() {
    let auth = client(spawn_identity_toolkit().await);

    let err = auth.sign_in("admin@zenith.in", "nope").await.unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::AuthError(AuthFailure::InvalidCredential)
    ));
    assert_eq!(err.public_message(), "Invalid email or password.");

    let err = auth.sign_in("locked@zenith.in", "pw").await.unwrap_err();
    assert_eq!(err.public_message(), "Too many attempts. Try again later.");
}

#[tokio::test]
async fn lookup_resolves_only_valid_tokens() {
    let auth = client(spawn_identity_toolkit().await);

    let user = auth.lookup("id-token-1").await.unwrap().unwrap();
    assert_eq!(user.email.as_deref(), Some("admin@zenith.in"));

    assert!(auth.lookup("forged").await.unwrap().is_none());
}
