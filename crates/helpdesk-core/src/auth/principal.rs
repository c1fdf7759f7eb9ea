//! Authenticated-identity value object
//!
//! A [`Principal`] is decoded once per inbound authenticated request and
//! lives for the duration of that request. It is immutable: every mutation
//! method returns a new instance, so a reference captured by one task can
//! never observe another task's changes. Principals are never persisted;
//! they carry bearer secrets.

use super::policy;
use crate::error::{HelpdeskError, HelpdeskResult};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use uuid::Uuid;

/// How the session presenting this principal was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionType {
    /// Browser session
    Web,
    /// Direct API access with an opaque token
    Api,
    /// JWT bearer session
    Jwt,
    /// MCP tool-server session
    Mcp,
    /// Third-party integration session
    Integration,
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionType::Web => write!(f, "web"),
            SessionType::Api => write!(f, "api"),
            SessionType::Jwt => write!(f, "jwt"),
            SessionType::Mcp => write!(f, "mcp"),
            SessionType::Integration => write!(f, "integration"),
        }
    }
}

/// Immutable authenticated identity with authorization state
#[derive(Debug, Clone)]
pub struct Principal {
    user_id: String,
    organization_id: String,
    email: String,
    full_name: Option<String>,
    roles: BTreeSet<String>,
    permissions: BTreeSet<String>,
    scopes: BTreeSet<String>,
    session_id: String,
    session_type: SessionType,
    token_issued_at: DateTime<Utc>,
    token_expires_at: DateTime<Utc>,
    api_token: Option<String>,
    refresh_token: Option<String>,
    claims: Value,
    last_used_at: Option<DateTime<Utc>>,
}

impl Principal {
    /// Construct a principal from decoded credentials.
    ///
    /// Fails fast on missing identity fields: an authorization decision must
    /// never be computed for an ill-formed identity, so this is the one
    /// place in the core that errors instead of degrading.
    pub fn new(
        user_id: impl Into<String>,
        organization_id: impl Into<String>,
        email: impl Into<String>,
        session_type: SessionType,
        token_expires_at: DateTime<Utc>,
    ) -> HelpdeskResult<Self> {
        let user_id = user_id.into();
        let organization_id = organization_id.into();
        let email = email.into();

        for (field, value) in [
            ("user_id", &user_id),
            ("organization_id", &organization_id),
            ("email", &email),
        ] {
            if value.trim().is_empty() {
                return Err(HelpdeskError::invalid_input(format!(
                    "principal is missing required identity field: {}",
                    field
                )));
            }
        }

        Ok(Self {
            user_id,
            organization_id,
            email,
            full_name: None,
            roles: BTreeSet::new(),
            permissions: BTreeSet::new(),
            scopes: BTreeSet::new(),
            session_id: Uuid::new_v4().to_string(),
            session_type,
            token_issued_at: Utc::now(),
            token_expires_at,
            api_token: None,
            refresh_token: None,
            claims: Value::Null,
            last_used_at: None,
        })
    }

    // ==========================================================================
    // Accessors
    // ==========================================================================

    /// User id
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Organization id
    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    /// Email address
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Full name, when provided by the identity provider
    pub fn full_name(&self) -> Option<&str> {
        self.full_name.as_deref()
    }

    /// Granted roles
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// Granted permissions
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    /// Granted scopes
    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    /// Session id
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Session type
    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    /// Token issue time
    pub fn token_issued_at(&self) -> DateTime<Utc> {
        self.token_issued_at
    }

    /// Token expiry time
    pub fn token_expires_at(&self) -> DateTime<Utc> {
        self.token_expires_at
    }

    /// Opaque API token, when present
    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref()
    }

    /// Refresh token, when present
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Raw provider claims payload
    pub fn claims(&self) -> &Value {
        &self.claims
    }

    /// Last time this principal was used for a downstream call
    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    // ==========================================================================
    // Copy-and-return-new mutation
    // ==========================================================================

    /// Set the full name
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Replace the role set
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the permission set
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the scope set
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the session id
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Set the opaque API token
    pub fn with_api_token(mut self, api_token: impl Into<String>) -> Self {
        self.api_token = Some(api_token.into());
        self
    }

    /// Set the refresh token
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Replace the raw claims payload
    pub fn with_claims(mut self, claims: Value) -> Self {
        self.claims = claims;
        self
    }

    /// Set the token validity window
    pub fn with_token_window(
        mut self,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        self.token_issued_at = issued_at;
        self.token_expires_at = expires_at;
        self
    }

    /// Set only the token expiry
    pub fn with_token_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.token_expires_at = expires_at;
        self
    }

    /// Return a copy marked as used now
    pub fn touch(mut self) -> Self {
        self.last_used_at = Some(Utc::now());
        self
    }

    // ==========================================================================
    // Authorization
    // ==========================================================================

    /// Whether the principal holds a permission (wildcard-aware)
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
            || policy::has_wildcard(self.permissions.iter().map(String::as_str))
    }

    /// Whether the principal holds a role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Whether the principal holds a scope (wildcard-aware)
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
            || policy::has_wildcard(self.scopes.iter().map(String::as_str))
    }

    /// Whether the token has expired (strict, timezone-aware)
    pub fn is_token_expired(&self) -> bool {
        Utc::now() >= self.token_expires_at
    }

    /// Whether the token is valid: unexpired AND all identity fields present
    pub fn is_token_valid(&self) -> bool {
        !self.is_token_expired()
            && !self.user_id.is_empty()
            && !self.organization_id.is_empty()
            && !self.email.is_empty()
    }

    /// Authorization decision for a named tool.
    ///
    /// Evaluated in fixed precedence order, first match wins:
    /// 1. expired token denies unconditionally;
    /// 2. `admin`/`super_admin` allow unconditionally;
    /// 3. `manager` allows, except highly sensitive tools which require
    ///    `admin.override`;
    /// 4. a tool listed in the permission table allows when ANY listed
    ///    permission is held;
    /// 5. an unlisted tool allows only with `tool.all` or role `developer`;
    /// 6. role `user` allows only the basic-tool allowlist;
    /// 7. deny.
    pub fn can_access_tool(&self, tool_name: &str) -> bool {
        if self.is_token_expired() {
            return false;
        }

        if self.has_role(policy::ROLE_ADMIN) || self.has_role(policy::ROLE_SUPER_ADMIN) {
            return true;
        }

        if self.has_role(policy::ROLE_MANAGER) {
            if policy::SENSITIVE_TOOLS.contains(tool_name) {
                return self.has_permission(policy::PERMISSION_ADMIN_OVERRIDE);
            }
            return true;
        }

        match policy::TOOL_PERMISSIONS.get(tool_name) {
            Some(required) => {
                if required.iter().any(|p| self.has_permission(p)) {
                    return true;
                }
            }
            None => {
                if self.has_permission(policy::PERMISSION_TOOL_ALL)
                    || self.has_role(policy::ROLE_DEVELOPER)
                {
                    return true;
                }
            }
        }

        if self.has_role(policy::ROLE_USER) {
            return policy::BASIC_TOOLS.contains(tool_name);
        }

        false
    }

    // ==========================================================================
    // Credential propagation
    // ==========================================================================

    /// Bearer credential to attach to downstream calls.
    ///
    /// Priority: opaque API token, then the raw provider token embedded in
    /// the claims payload, then the refresh token as a last resort.
    pub fn auth_token(&self) -> Option<&str> {
        if let Some(token) = self.api_token.as_deref() {
            return Some(token);
        }
        if let Some(token) = self
            .claims
            .get("access_token")
            .or_else(|| self.claims.get("token"))
            .and_then(Value::as_str)
        {
            return Some(token);
        }
        self.refresh_token.as_deref()
    }

    /// Deterministic short digest identifying this principal for caching.
    ///
    /// Stable across calls for identical identity, role/permission sets,
    /// session type, and credential; any change to one of those changes the
    /// digest.
    pub fn cache_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.user_id.as_bytes());
        hasher.update(b"|");
        hasher.update(self.organization_id.as_bytes());
        hasher.update(b"|");
        // BTreeSet iteration is already sorted
        for role in &self.roles {
            hasher.update(role.as_bytes());
            hasher.update(b",");
        }
        hasher.update(b"|");
        for permission in &self.permissions {
            hasher.update(permission.as_bytes());
            hasher.update(b",");
        }
        hasher.update(b"|");
        hasher.update(self.session_type.to_string().as_bytes());
        hasher.update(b"|");

        let token_digest = match self.auth_token() {
            Some(token) => format!("{:x}", Sha256::digest(token.as_bytes())),
            None => "none".to_string(),
        };
        hasher.update(token_digest.as_bytes());

        let digest = format!("{:x}", hasher.finalize());
        digest[..16].to_string()
    }
}
