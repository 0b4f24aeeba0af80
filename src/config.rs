// ABOUTME: Middleware configuration: protocol paths, enabled flows, realm, and scope allow-list
// ABOUTME: Also defines the ResourceAuthenticator seam that enables the password grant
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use async_trait::async_trait;

use crate::models::ResponseType;

/// Configuration for the OAuth 2.0 middleware
///
/// All options have working defaults; construct with struct-update syntax:
///
/// ```rust
/// use oauth2_provider::config::OAuth2Config;
///
/// let config = OAuth2Config {
///     realm: Some("api.example.org".to_owned()),
///     scopes: Some(vec!["read".to_owned(), "write".to_owned()]),
///     ..OAuth2Config::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    /// Path intercepted as the authorize endpoint
    pub authorize_path: String,
    /// Path intercepted as the token endpoint
    pub access_token_path: String,
    /// Response types the authorize endpoint accepts; both flows by default
    pub authorization_types: Vec<ResponseType>,
    /// Realm used in `WWW-Authenticate` challenges; defaults to the
    /// request's `Host` when unset
    pub realm: Option<String>,
    /// Scope allow-list; `None` accepts any scope names
    pub scopes: Option<Vec<String>>,
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            authorize_path: "/oauth/authorize".to_owned(),
            access_token_path: "/oauth/access_token".to_owned(),
            authorization_types: vec![ResponseType::Code, ResponseType::Token],
            realm: None,
            scopes: None,
        }
    }
}

/// Host-application callback that verifies resource-owner credentials
///
/// Wiring an implementation into the provider enables the `password` grant
/// at the token endpoint; without one the grant answers
/// `unsupported_grant_type`.
#[async_trait]
pub trait ResourceAuthenticator: Send + Sync {
    /// Verify a username/password pair.
    ///
    /// Returns the opaque resource identifier of the authenticated end user,
    /// or `None` when the credentials do not check out.
    ///
    /// # Errors
    /// Implementations may fail on backend errors; the token endpoint
    /// reports those as `invalid_grant` without detail.
    async fn authenticate(&self, username: &str, password: &str)
        -> anyhow::Result<Option<String>>;
}
