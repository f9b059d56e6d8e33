/*
 *  auth.rs
 *
 *  SkyMonS - what's overhead
 *  (c) 2025-26 Stuart Hunter
 *
 *  Bearer token cache for the position API
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::{secs, AuthConfig, EndpointConfig};
use crate::error::AuthError;
use crate::http::build_client;

const MAX_LIFETIME_SECS: i64 = 24 * 3600;

/// Which way we talk to the token endpoint. Client credentials win.
#[derive(Debug, Clone, PartialEq)]
pub enum Credentials {
    ClientCredentials { client_id: String, client_secret: String },
    Password { username: String, password: String },
    Anonymous,
}

impl Credentials {
    pub fn from_config(cfg: &AuthConfig) -> Self {
        let non_empty = |s: &Option<String>| s.as_deref().filter(|v| !v.is_empty()).map(str::to_string);
        if let (Some(client_id), Some(client_secret)) = (non_empty(&cfg.client_id), non_empty(&cfg.client_secret)) {
            return Credentials::ClientCredentials { client_id, client_secret };
        }
        if let (Some(username), Some(password)) = (non_empty(&cfg.username), non_empty(&cfg.password)) {
            return Credentials::Password { username, password };
        }
        Credentials::Anonymous
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Credentials::Anonymous)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthToken {
    pub value: String,
    /// already pulled forward by the refresh margin
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ClientTokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

/// Token plus server-declared lifetime in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    pub token: String,
    pub lifetime_secs: Option<i64>,
}

#[derive(Debug)]
pub struct AuthTokenManager {
    credentials: Credentials,
    token_url: String,
    login_url: String,
    refresh_margin: TimeDelta,
    default_lifetime: TimeDelta,
    client: Client,
    token: Option<AuthToken>,
}

impl AuthTokenManager {
    pub fn new(auth: &AuthConfig, endpoints: &EndpointConfig) -> Result<Self, reqwest::Error> {
        let credentials = Credentials::from_config(auth);
        if credentials.is_anonymous() {
            warn!("No position API credentials configured, using anonymous access");
        }
        Ok(Self {
            credentials,
            token_url: endpoints.token_url.clone(),
            login_url: endpoints.login_url.clone(),
            refresh_margin: secs(auth.refresh_margin_secs),
            default_lifetime: secs(auth.default_lifetime_secs),
            client: build_client(Duration::from_secs(3), Duration::from_secs(10))?,
            token: None,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Cached token if still outside its refresh margin. No side effects.
    pub fn cached(&self, now: DateTime<Utc>) -> Option<&str> {
        self.token
            .as_ref()
            .filter(|t| now < t.expires_at)
            .map(|t| t.value.as_str())
    }

    /// Cache a fresh grant, expiring `margin` ahead of the server's lifetime.
    /// A lifetime outside 1s..=1 day is ignored in favour of the default.
    pub fn store(&mut self, grant: Grant, now: DateTime<Utc>) -> &str {
        let lifetime = grant
            .lifetime_secs
            .filter(|s| (1..=MAX_LIFETIME_SECS).contains(s))
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(self.default_lifetime);
        // unrepresentable expiry means refresh on next use
        let expires_at = now
            .checked_add_signed(lifetime)
            .and_then(|t| t.checked_sub_signed(self.refresh_margin))
            .unwrap_or(now);
        info!("Got position API token, refresh due {}", expires_at.format("%H:%M:%S"));
        &self.token.insert(AuthToken { value: grant.token, expires_at }).value
    }

    pub fn invalidate(&mut self) {
        if self.token.take().is_some() {
            info!("Position API token invalidated");
        }
    }

    /// Cached token, or a fresh one from the server. `None` means go
    /// anonymous or skip, never fatal.
    pub async fn get_token(&mut self, now: DateTime<Utc>) -> Option<String> {
        if let Some(token) = self.cached(now) {
            return Some(token.to_string());
        }
        match self.acquire().await {
            Ok(grant) => Some(self.store(grant, now).to_string()),
            Err(AuthError::NoCredentials) => None,
            Err(e) => {
                warn!("Token request failed: {}", e);
                self.token = None;
                None
            }
        }
    }

    async fn acquire(&self) -> Result<Grant, AuthError> {
        match &self.credentials {
            Credentials::ClientCredentials { client_id, client_secret } => {
                debug!("Requesting client token from {}", self.token_url);
                let response = self.client
                    .post(&self.token_url)
                    .form(&[
                        ("grant_type", "client_credentials"),
                        ("client_id", client_id.as_str()),
                        ("client_secret", client_secret.as_str()),
                    ])
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    if status.as_u16() == 403 {
                        warn!("Token endpoint refused the client id/secret");
                    }
                    return Err(AuthError::Status(status.as_u16()));
                }
                let body: ClientTokenResponse = response.json().await?;
                let token = body.access_token
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| AuthError::Malformed("no access_token".into()))?;
                Ok(Grant { token, lifetime_secs: body.expires_in })
            }
            Credentials::Password { username, password } => {
                debug!("Requesting user token from {}", self.login_url);
                let response = self.client
                    .post(&self.login_url)
                    .basic_auth(username, Some(password))
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(AuthError::Status(status.as_u16()));
                }
                let body: LoginResponse = response.json().await?;
                let token = body.token
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| AuthError::Malformed("no token".into()))?;
                Ok(Grant { token, lifetime_secs: None })
            }
            Credentials::Anonymous => Err(AuthError::NoCredentials),
        }
    }
}
