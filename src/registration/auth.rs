//! Firebase authentication and the admin allow-list

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

use crate::registration::config::IdentityConfig;
use crate::registration::error::RegistrationError;

/// Signed-in account as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedIn {
    pub user: AuthUser,
    pub id_token: String,
    pub expires_in: u64,
}

/// Provider failures translated into what the login form shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    InvalidCredential,
    TooManyRequests,
    Other(String),
}

impl AuthFailure {
    /// Accepts both Identity Toolkit REST codes and SDK style `auth/...` codes.
    pub fn from_provider_code(code: &str) -> Self {
        // REST codes may carry a detail suffix: "TOO_MANY_ATTEMPTS_TRY_LATER : ..."
        let code = code.split(" : ").next().unwrap_or(code).trim();
        match code {
            "INVALID_LOGIN_CREDENTIALS"
            | "INVALID_PASSWORD"
            | "EMAIL_NOT_FOUND"
            | "INVALID_EMAIL"
            | "auth/invalid-credential" => AuthFailure::InvalidCredential,
            "TOO_MANY_ATTEMPTS_TRY_LATER" | "auth/too-many-requests" => {
                AuthFailure::TooManyRequests
            }
            other => AuthFailure::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthFailure::InvalidCredential => write!(f, "Invalid email or password."),
            AuthFailure::TooManyRequests => write!(f, "Too many attempts. Try again later."),
            AuthFailure::Other(_) => write!(f, "Login failed. Please try again."),
        }
    }
}

/// Lower-cased admin emails, parsed from a comma separated list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminAllowList {
    emails: HashSet<String>,
}

impl AdminAllowList {
    pub fn parse(list: &str) -> Self {
        Self {
            emails: list
                .split(',')
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn is_admin(&self, user: Option<&AuthUser>) -> bool {
        match user.and_then(|u| u.email.as_deref()) {
            Some(email) => self.emails.contains(&email.trim().to_lowercase()),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, RegistrationError>;

    /// Resolves an ID token, `Ok(None)` when the provider rejects it.
    async fn lookup(&self, id_token: &str) -> Result<Option<AuthUser>, RegistrationError>;
}

/// Identity Toolkit REST client.
pub struct FirebaseAuth {
    http: reqwest::Client,
    config: IdentityConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordSignIn<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordSignInResponse {
    local_id: String,
    email: Option<String>,
    id_token: String,
    expires_in: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Deserialize)]
struct ProviderErrorDetail {
    message: String,
}

impl FirebaseAuth {
    pub fn new(config: IdentityConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1/accounts:{}?key={}",
            self.config.base_url.trim_end_matches('/'),
            method,
            self.config.api_key
        )
    }

    async fn provider_code(resp: reqwest::Response) -> String {
        let status = resp.status();
        match resp.json::<ProviderErrorBody>().await {
            Ok(body) => body.error.message,
            Err(_) => format!("HTTP_{}", status.as_u16()),
        }
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, RegistrationError> {
        let resp = self
            .http
            .post(self.endpoint("signInWithPassword"))
            .json(&PasswordSignIn {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await
            .map_err(|e| RegistrationError::ProviderError(format!("Sign-in request failed: {}", e)))?;

        if !resp.status().is_success() {
            let code = Self::provider_code(resp).await;
            warn!("Sign-in rejected for {}: {}", email, code);
            return Err(RegistrationError::AuthError(AuthFailure::from_provider_code(
                &code,
            )));
        }

        let body: PasswordSignInResponse = resp.json().await.map_err(|e| {
            RegistrationError::ProviderError(format!("Unreadable sign-in response: {}", e))
        })?;

        Ok(SignedIn {
            user: AuthUser {
                uid: body.local_id,
                email: body.email.or_else(|| Some(email.to_string())),
            },
            id_token: body.id_token,
            expires_in: body
                .expires_in
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),
        })
    }

    async fn lookup(&self, id_token: &str) -> Result<Option<AuthUser>, RegistrationError> {
        let resp = self
            .http
            .post(self.endpoint("lookup"))
            .json(&LookupRequest { id_token })
            .send()
            .await
            .map_err(|e| RegistrationError::ProviderError(format!("Token lookup failed: {}", e)))?;

        if resp.status().is_client_error() {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let code = Self::provider_code(resp).await;
            return Err(RegistrationError::ProviderError(code));
        }

        let body: LookupResponse = resp.json().await.map_err(|e| {
            RegistrationError::ProviderError(format!("Unreadable lookup response: {}", e))
        })?;

        Ok(body.users.into_iter().next().map(|u| AuthUser {
            uid: u.local_id,
            email: u.email,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChange {
    SignedIn(AuthUser),
    SignedOut(AuthUser),
}

/// Admin gate: provider sign-in plus the allow-list check, with a feed of
/// session changes. Tokens stay the provider's; nothing is issued here.
pub struct AdminAuth {
    provider: Arc<dyn IdentityProvider>,
    allow_list: AdminAllowList,
    changes: broadcast::Sender<AuthChange>,
}

impl AdminAuth {
    pub fn new(provider: Arc<dyn IdentityProvider>, allow_list: AdminAllowList) -> Self {
        if allow_list.is_empty() {
            warn!("Admin allow-list is empty, nobody can use the admin panel");
        }
        let (changes, _) = broadcast::channel(64);
        Self {
            provider,
            allow_list,
            changes,
        }
    }

    pub fn is_admin(&self, user: Option<&AuthUser>) -> bool {
        self.allow_list.is_admin(user)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, RegistrationError> {
        let signed_in = self.provider.sign_in(email.trim(), password).await?;

        if !self.is_admin(Some(&signed_in.user)) {
            warn!("Non-admin sign-in attempt: {}", email);
            return Err(RegistrationError::NotAdmin);
        }

        let _ = self.changes.send(AuthChange::SignedIn(signed_in.user.clone()));
        Ok(signed_in)
    }

    /// The client drops its token; listeners are told the session ended.
    pub async fn sign_out(&self, id_token: &str) -> Result<(), RegistrationError> {
        if let Some(user) = self.provider.lookup(id_token).await? {
            let _ = self.changes.send(AuthChange::SignedOut(user));
        }
        Ok(())
    }

    /// Resolves a bearer token to an allow-listed admin.
    pub async fn authorize(&self, id_token: Option<&str>) -> Result<AuthUser, RegistrationError> {
        let token = id_token
            .filter(|t| !t.is_empty())
            .ok_or(RegistrationError::Unauthenticated)?;
        let user = self
            .provider
            .lookup(token)
            .await?
            .ok_or(RegistrationError::Unauthenticated)?;

        if self.is_admin(Some(&user)) {
            Ok(user)
        } else {
            Err(RegistrationError::NotAdmin)
        }
    }

    pub fn on_auth_change(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }
}
