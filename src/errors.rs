// ABOUTME: Protocol error taxonomy with stable OAuth 2.0 wire codes
// ABOUTME: Carries each failure to its surface: plaintext 400, error redirect, JSON body, or challenge
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Protocol Error Handling
//!
//! Every protocol failure in this crate is a [`ProtocolError`]. The variant
//! decides the stable wire code (`invalid_client`, `invalid_grant`, ...);
//! the surface it is reported on (400 plaintext, error redirect, token
//! endpoint JSON, or `WWW-Authenticate` challenge) is decided by the
//! endpoint that caught it, never by the error itself.

use serde::Serialize;
use thiserror::Error;

/// Result alias used by the protocol components
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Protocol-level failures, one variant per OAuth 2.0 error code
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    /// Malformed or missing parameter at a point where no client context exists
    #[error("{0}")]
    InvalidRequest(String),

    /// Unknown client, bad secret, or revoked registration.
    /// Deliberately carries no detail: the resolver must not reveal which
    /// check failed.
    #[error("client authentication failed")]
    InvalidClient,

    /// Supplied redirect URI differs from the pre-registered one
    #[error("redirect URI does not match the one registered for this client")]
    RedirectUriMismatch,

    /// `response_type` absent, unrecognized, or disabled by configuration
    #[error("unsupported response type")]
    UnsupportedResponseType,

    /// Requested scope contains names outside the configured allow-list
    #[error("{0}")]
    InvalidScope(String),

    /// Authorization code unknown, consumed, expired, or bound to another client
    #[error("{0}")]
    InvalidGrant(String),

    /// `grant_type` absent, unrecognized, or not enabled
    #[error("grant type not supported")]
    UnsupportedGrantType,

    /// Bearer token unknown or revoked
    #[error("{0}")]
    InvalidToken(String),

    /// Bearer token past its expiry instant
    #[error("access token has expired")]
    ExpiredToken,

    /// Host application rejected the request for lack of scope; payload is
    /// the space-joined list of scopes that would have sufficed
    #[error("insufficient scope for this request")]
    InsufficientScope(String),
}

impl ProtocolError {
    /// Stable wire code clients may key on
    #[must_use]
    pub const fn wire_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::RedirectUriMismatch => "redirect_uri_mismatch",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::InvalidScope(_) => "invalid_scope",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidToken(_) => "invalid_token",
            Self::ExpiredToken => "expired_token",
            Self::InsufficientScope(_) => "insufficient_scope",
        }
    }

    /// Shorthand for an `invalid_request` with a human-readable message
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Shorthand for an `invalid_grant` with a human-readable message
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant(message.into())
    }
}

/// Token endpoint JSON error body (`{"error": ..., "error_description": ...}`)
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable wire code
    pub error: &'static str,
    /// Human-readable message
    pub error_description: String,
}

impl From<&ProtocolError> for ErrorBody {
    fn from(error: &ProtocolError) -> Self {
        Self {
            error: error.wire_code(),
            error_description: error.to_string(),
        }
    }
}

/// `WWW-Authenticate` challenge assembler
///
/// Produces `OAuth realm="..."`, optionally followed by
/// `, error="...", error_description="..."`, optionally followed by
/// `, scope="..."`.
#[derive(Debug, Clone)]
pub struct Challenge {
    realm: String,
    error: Option<(&'static str, String)>,
    scope: Option<String>,
}

impl Challenge {
    /// Bare challenge for the given realm
    #[must_use]
    pub fn new(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            error: None,
            scope: None,
        }
    }

    /// Attach the error code and description of a protocol failure
    #[must_use]
    pub fn with_error(mut self, error: &ProtocolError) -> Self {
        self.error = Some((error.wire_code(), error.to_string()));
        if let ProtocolError::InsufficientScope(scope) = error {
            self.scope = Some(scope.clone());
        }
        self
    }

    /// Render the challenge as a `WWW-Authenticate` header value
    #[must_use]
    pub fn header_value(&self) -> String {
        let mut value = format!("OAuth realm=\"{}\"", quote(&self.realm));
        if let Some((code, description)) = &self.error {
            value.push_str(&format!(
                ", error=\"{}\", error_description=\"{}\"",
                quote(code),
                quote(description)
            ));
        }
        if let Some(scope) = &self.scope {
            value.push_str(&format!(", scope=\"{}\"", quote(scope)));
        }
        value
    }
}

/// Escape a value for inclusion in a quoted-string challenge parameter
fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
