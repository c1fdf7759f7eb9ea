//! Token refresh state machine
//!
//! Credentials move through `VALID → REFRESHING → {VALID' | FAILED}` either
//! proactively (expiry inside the lookahead window) or reactively (a 401/403
//! observed on a downstream tool call). Refresh strategy dispatches on the
//! token shape: opaque API tokens are revalidated and extended, JWT sessions
//! exchange their refresh token, falling back to a locally minted short-lived
//! token when the identity provider is unavailable.
//!
//! Refresh failure is never fatal. A `None` result means "proceed without
//! this credential"; callers degrade (for example to an unauthenticated tool
//! client) instead of crashing.

use super::principal::Principal;
use crate::config::RefreshConfig;
use crate::error::HelpdeskResult;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Claims returned by opaque-token validation
#[derive(Debug, Clone)]
pub struct TokenClaims {
    /// Subject user id
    pub user_id: String,
    /// Subject email
    pub email: String,
    /// Expiry reported by the issuing authority, when any
    pub expires_at: Option<DateTime<Utc>>,
    /// Raw provider payload
    pub raw: Value,
}

/// New credential pair returned by a refresh-token exchange
#[derive(Debug, Clone)]
pub struct TokenExchange {
    /// New access token
    pub access_token: String,
    /// Rotated refresh token, when the provider issues one
    pub refresh_token: Option<String>,
    /// Expiry of the new access token
    pub expires_at: DateTime<Utc>,
}

/// Identity-provider boundary consumed by the refresh manager
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Validate an opaque API token against the issuing authority
    async fn verify_api_token(&self, token: &str) -> HelpdeskResult<TokenClaims>;

    /// Exchange a refresh token for a new access/refresh pair.
    /// `Ok(None)` means the provider rejected the refresh token.
    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
    ) -> HelpdeskResult<Option<TokenExchange>>;
}

/// Shape of the credential a principal carries, driving refresh strategy
#[derive(Debug, Clone)]
pub enum TokenKind {
    /// Long-lived opaque API token: revalidated, never rotated
    Opaque { api_token: String },
    /// JWT-style session: refreshed through the refresh token
    Jwt { refresh_token: Option<String> },
}

impl TokenKind {
    /// Classify a principal's credential
    pub fn of(principal: &Principal) -> Self {
        match principal.api_token() {
            Some(token) => Self::Opaque {
                api_token: token.to_string(),
            },
            None => Self::Jwt {
                refresh_token: principal.refresh_token().map(str::to_string),
            },
        }
    }
}

/// Decides when a principal's credential needs renewal and performs it
pub struct TokenRefreshManager {
    provider: Arc<dyn IdentityProvider>,
    config: RefreshConfig,
}

impl TokenRefreshManager {
    /// Create a manager with default policy
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self::with_config(provider, RefreshConfig::default())
    }

    /// Create a manager with custom policy
    pub fn with_config(provider: Arc<dyn IdentityProvider>, config: RefreshConfig) -> Self {
        Self { provider, config }
    }

    /// Refresh policy in effect
    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Whether the credential should be renewed now.
    ///
    /// Expired tokens always need renewal. Unexpired opaque API tokens are
    /// treated as long-lived and exempt from the lookahead rule; other
    /// tokens refresh once expiry is closer than the lookahead window.
    pub fn should_refresh(&self, principal: &Principal) -> bool {
        if principal.is_token_expired() {
            return true;
        }
        if matches!(TokenKind::of(principal), TokenKind::Opaque { .. }) {
            return false;
        }

        let lookahead = ChronoDuration::from_std(self.config.lookahead)
            .unwrap_or_else(|_| ChronoDuration::minutes(5));
        principal.token_expires_at() - Utc::now() < lookahead
    }

    /// Renew the principal's credential, returning the refreshed copy.
    ///
    /// `None` means renewal was impossible (provider rejected an opaque
    /// token, or a JWT session has no refresh token at all).
    pub async fn refresh(&self, principal: &Principal) -> Option<Principal> {
        match TokenKind::of(principal) {
            TokenKind::Opaque { api_token } => self.revalidate_opaque(principal, &api_token).await,
            TokenKind::Jwt { refresh_token } => {
                let refresh_token = refresh_token?;
                Some(self.exchange_jwt(principal, &refresh_token).await)
            }
        }
    }

    /// Reactive renewal after a downstream auth failure.
    ///
    /// Only 401 and 403 indicate a credential problem; any other status is a
    /// no-op. Retries [`refresh`](Self::refresh) with exponential backoff,
    /// observing cancellation between and during waits. Exhaustion returns
    /// `None` and the caller proceeds without the credential.
    pub async fn handle_auth_failure(
        &self,
        principal: &Principal,
        http_status: u16,
        cancel: Option<&CancellationToken>,
    ) -> Option<Principal> {
        if http_status != 401 && http_status != 403 {
            debug!(http_status, "status does not indicate a credential problem");
            return None;
        }

        info!(
            user_id = principal.user_id(),
            http_status, "attempting reactive token refresh"
        );

        for attempt in 0..self.config.max_retries {
            if cancel.map(|t| t.is_cancelled()).unwrap_or(false) {
                debug!("reactive refresh cancelled");
                return None;
            }

            if let Some(refreshed) = self.refresh(principal).await {
                debug!(
                    user_id = principal.user_id(),
                    attempt, "reactive refresh succeeded"
                );
                return Some(refreshed);
            }

            if attempt + 1 < self.config.max_retries {
                let delay = self.config.backoff_delay(attempt);
                match cancel {
                    Some(token) => {
                        tokio::select! {
                            _ = token.cancelled() => {
                                debug!("reactive refresh cancelled during backoff");
                                return None;
                            }
                            _ = sleep(delay) => {}
                        }
                    }
                    None => sleep(delay).await,
                }
            }
        }

        warn!(
            user_id = principal.user_id(),
            attempts = self.config.max_retries,
            "reactive token refresh exhausted"
        );
        None
    }

    async fn revalidate_opaque(&self, principal: &Principal, api_token: &str) -> Option<Principal> {
        match self.provider.verify_api_token(api_token).await {
            Ok(_claims) => {
                let extension = ChronoDuration::from_std(self.config.opaque_extension)
                    .unwrap_or_else(|_| ChronoDuration::hours(24));
                Some(
                    principal
                        .clone()
                        .with_token_expiry(Utc::now() + extension)
                        .touch(),
                )
            }
            Err(e) => {
                warn!(
                    user_id = principal.user_id(),
                    "opaque token revalidation failed: {}", e
                );
                None
            }
        }
    }

    async fn exchange_jwt(&self, principal: &Principal, refresh_token: &str) -> Principal {
        match self.provider.exchange_refresh_token(refresh_token).await {
            Ok(Some(exchange)) => {
                let new_refresh = exchange
                    .refresh_token
                    .unwrap_or_else(|| refresh_token.to_string());
                principal
                    .clone()
                    .with_claims(embed_access_token(
                        principal.claims(),
                        &exchange.access_token,
                    ))
                    .with_refresh_token(new_refresh)
                    .with_token_window(Utc::now(), exchange.expires_at)
                    .touch()
            }
            Ok(None) | Err(_) => {
                // Provider unavailable or rejecting: mint a short-lived local
                // token bound to the same identity so the session can limp
                // along until the provider recovers. The refresh token is
                // preserved for the next attempt.
                info!(
                    user_id = principal.user_id(),
                    "refresh exchange unavailable, minting local short-lived token"
                );
                let now = Utc::now();
                let ttl = ChronoDuration::from_std(self.config.local_token_ttl)
                    .unwrap_or_else(|_| ChronoDuration::hours(1));
                let local = mint_local_token(principal.user_id(), principal.email(), now);
                principal
                    .clone()
                    .with_claims(embed_access_token(principal.claims(), &local))
                    .with_token_window(now, now + ttl)
                    .touch()
            }
        }
    }
}

/// Replace the access token inside a claims payload, preserving other fields
fn embed_access_token(claims: &Value, access_token: &str) -> Value {
    let mut object = match claims {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    object.insert(
        "access_token".to_string(),
        Value::String(access_token.to_string()),
    );
    Value::Object(object)
}

/// Mint an opaque local access token bound to an identity and mint time
fn mint_local_token(user_id: &str, email: &str, minted_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b"|");
    hasher.update(email.as_bytes());
    hasher.update(b"|");
    hasher.update(minted_at.timestamp_micros().to_le_bytes());
    format!("local-{:x}", hasher.finalize())
}
