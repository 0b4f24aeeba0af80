// ABOUTME: Core OAuth 2.0 entities: clients, authorization requests, grants, and access tokens
// ABOUTME: Includes scope normalization and opaque 32-hex token minting
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use anyhow::Context;
use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ProtocolError, ProtocolResult};

/// Response types accepted at the authorize endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Authorization-code flow: a one-shot code redeemed at the token endpoint
    Code,
    /// Implicit flow: the access token is delivered in the redirect fragment
    Token,
}

impl ResponseType {
    /// Wire form of the response type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Token => "token",
        }
    }

    /// Parse the wire form; anything but `code`/`token` is unrecognized
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "code" => Some(Self::Code),
            "token" => Some(Self::Token),
            _ => None,
        }
    }
}

/// A registered third-party application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Stable opaque identifier
    pub id: String,
    /// Shared secret, compared in constant time
    pub secret: String,
    /// Pre-registered absolute redirect URI; `None` accepts any well-formed
    /// absolute URI at request time
    pub redirect_uri: Option<String>,
    /// Human-readable name for logs and the consent view
    pub display_name: String,
    /// Revoked clients are treated as if they did not exist
    pub revoked: bool,
}

/// Status of an in-flight authorization request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthRequestStatus {
    /// Created by the authorize endpoint, waiting on the consent step
    Pending,
    /// End user granted access; `grant_code` or `access_token` is populated
    Granted,
    /// End user denied access
    Denied,
}

/// Durable record of one in-progress end-user authorization
///
/// Created by Phase A of the authorize flow and finalized by Phase C after
/// the host application reports the consent outcome. Terminal transitions
/// are irreversible; the store enforces the conditional-on-pending update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Opaque identifier, used as the consent correlation handle
    pub id: Uuid,
    /// Client that initiated the authorization
    pub client_id: String,
    /// Normalized scope (deduplicated, order-preserving, single-spaced)
    pub scope: String,
    /// Validated redirect URI in string form
    pub redirect_uri: String,
    /// Flow selected by the client
    pub response_type: ResponseType,
    /// Opaque client-supplied value, echoed on every response
    pub state: Option<String>,
    /// Authorization code, populated on grant when `response_type` is `code`
    pub grant_code: Option<String>,
    /// Access token, populated on grant when `response_type` is `token`
    pub access_token: Option<String>,
    /// Lifecycle status
    pub status: AuthRequestStatus,
    /// Creation instant, used for pending-request expiry
    pub created_at: DateTime<Utc>,
}

impl AuthRequest {
    /// Whether the request still awaits its consent outcome
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == AuthRequestStatus::Pending
    }
}

/// Fields the authorize endpoint hands to the store when creating an
/// [`AuthRequest`]
#[derive(Debug, Clone)]
pub struct NewAuthRequest {
    /// Client that initiated the authorization
    pub client_id: String,
    /// Normalized scope
    pub scope: String,
    /// Validated redirect URI in string form
    pub redirect_uri: String,
    /// Flow selected by the client
    pub response_type: ResponseType,
    /// Opaque client-supplied value
    pub state: Option<String>,
}

/// A one-shot authorization code
///
/// Created when an authorization is granted with `response_type=code` and
/// consumed exactly once by the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Opaque code, 32 lowercase-hex characters
    pub code: String,
    /// Client the code was issued to
    pub client_id: String,
    /// End user the eventual token acts on behalf of
    pub resource: String,
    /// Normalized scope carried over from the authorization request
    pub scope: String,
    /// Redirect URI the code was delivered to; the token endpoint requires
    /// an identical value when this is non-empty
    pub redirect_uri: String,
    /// Expiry instant; an expired code behaves as unknown
    pub expires_at: DateTime<Utc>,
}

/// A bearer credential naming `(resource, client, scope)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    /// Opaque token, 32 lowercase-hex characters
    pub token: String,
    /// End user the token acts on behalf of
    pub resource: String,
    /// Client the token was issued to
    pub client_id: String,
    /// Normalized scope
    pub scope: String,
    /// Issuance instant
    pub created_at: DateTime<Utc>,
    /// Expiry instant; `None` means non-expiring
    pub expires_at: Option<DateTime<Utc>>,
    /// Revoked tokens never authenticate
    pub revoked: bool,
}

impl AccessToken {
    /// Whether the token is past its expiry instant
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Normalize a raw scope string: split on whitespace, drop duplicates
/// keeping first-occurrence order, rejoin with single spaces
#[must_use]
pub fn normalize_scope(raw: &str) -> String {
    let mut seen = Vec::new();
    for name in raw.split_whitespace() {
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen.join(" ")
}

/// Individual scope names of a normalized scope string
#[must_use]
pub fn scope_names(scope: &str) -> Vec<String> {
    scope.split_whitespace().map(str::to_owned).collect()
}

/// Validate a normalized scope against the configured allow-list.
///
/// # Errors
/// Returns `InvalidScope` naming the first scope outside the allow-list.
/// A `None` allow-list accepts everything.
pub fn validate_scope(scope: &str, allowed: Option<&[String]>) -> ProtocolResult<()> {
    let Some(allowed) = allowed else {
        return Ok(());
    };
    for name in scope.split_whitespace() {
        if !allowed.iter().any(|a| a == name) {
            return Err(ProtocolError::InvalidScope(format!(
                "requested scope '{name}' is not available"
            )));
        }
    }
    Ok(())
}

/// Mint an opaque identifier: 32 lowercase-hex characters (128 bits)
///
/// # Errors
/// Returns an error if the system RNG fails; the server cannot issue
/// credentials without working randomness.
pub fn generate_secure_token() -> anyhow::Result<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes)
        .map_err(|_| anyhow::anyhow!("system RNG failure"))
        .context("cannot generate secure random identifier")?;
    Ok(hex::encode(bytes))
}
