//! Auth service client.
//!
//! Talks to a GoTrue-style REST auth service. Every call returns the
//! service's error unchanged; nothing is retried.

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::models::{AuthSession, Session, User};
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Where to send the user to finish an OAuth sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRedirect {
    pub provider: String,
    pub url: String,
}

pub struct AuthClient {
    base_url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl AuthClient {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let base_url = config
            .url
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .ok_or(AuthError::NotConfigured)?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key {
            Some(ref key) => builder.header("apikey", key),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value, AuthError> {
        let response = self.request(builder).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| AuthError::Malformed(e.to_string()))
    }

    /// Email/password sign-in.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        debug!("Signing in {}", email);
        let body = self
            .send(
                self.http_client
                    .post(self.url("token"))
                    .query(&[("grant_type", "password")])
                    .json(&json!({"email": email, "password": password})),
            )
            .await?;

        let auth = parse_auth_response(&body)?;
        info!("Signed in as {}", auth.user.email);
        Ok(auth)
    }

    /// Create an account. The session is `None` when the service requires
    /// email confirmation first.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthSession, AuthError> {
        debug!("Signing up {}", email);
        let body = self
            .send(self.http_client.post(self.url("signup")).json(&json!({
                "email": email,
                "password": password,
                "data": {"name": name},
            })))
            .await?;

        parse_auth_response(&body)
    }

    /// OAuth sign-in starts in the browser; this only builds the URL.
    pub fn sign_in_with_provider(&self, provider: &str) -> Result<ProviderRedirect, AuthError> {
        let mut url = reqwest::Url::parse(&self.url("authorize"))
            .map_err(|e| AuthError::Malformed(format!("invalid auth url: {}", e)))?;
        url.query_pairs_mut().append_pair("provider", provider);

        Ok(ProviderRedirect {
            provider: provider.to_string(),
            url: url.to_string(),
        })
    }

    pub async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        self.send(
            self.http_client
                .post(self.url("logout"))
                .bearer_auth(&session.access_token),
        )
        .await?;
        debug!("Signed out");
        Ok(())
    }
}

/// Pull a readable message out of an error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn parse_user(value: &Value) -> Result<User, AuthError> {
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AuthError::Malformed("user without id".to_string()))?;
    let email = value
        .get("email")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let name = value
        .pointer("/user_metadata/name")
        .and_then(Value::as_str)
        .unwrap_or(email);

    Ok(User {
        id: id.to_string(),
        email: email.to_string(),
        name: name.to_string(),
    })
}

/// A token response carries a session plus `user`; a bare user object
/// means no session was issued.
fn parse_auth_response(body: &Value) -> Result<AuthSession, AuthError> {
    let Some(access_token) = body.get("access_token").and_then(Value::as_str) else {
        return Ok(AuthSession {
            user: parse_user(body.get("user").unwrap_or(body))?,
            session: None,
        });
    };

    let user = body
        .get("user")
        .ok_or_else(|| AuthError::Malformed("token response without user".to_string()))
        .and_then(parse_user)?;

    let expires_at = body
        .get("expires_at")
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .or_else(|| {
            body.get("expires_in")
                .and_then(Value::as_i64)
                .and_then(TimeDelta::try_seconds)
                .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        });

    Ok(AuthSession {
        user,
        session: Some(Session {
            access_token: access_token.to_string(),
            refresh_token: body
                .get("refresh_token")
                .and_then(Value::as_str)
                .map(str::to_string),
            expires_at,
        }),
    })
}
