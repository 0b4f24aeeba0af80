// ABOUTME: Dispatcher middleware: classifies each request and drives the protocol components
// ABOUTME: Owns the provider state, request-extension keys, and the host-app sentinel headers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! OAuth 2.0 provider middleware
//!
//! Every inbound request is classified into one of three roles and
//! dispatched: the configured token path goes to the token issuer, the
//! configured authorize path goes to the authorizer, and everything else
//! passes through the resource gate. Consent responses are recognized on
//! the way back out, by the [`AUTHORIZATION_SENTINEL`] header the host
//! application attaches.
//!
//! # Usage
//!
//! ```rust,no_run
//! use axum::{middleware, routing::get, Router};
//! use oauth2_provider::config::OAuth2Config;
//! use oauth2_provider::middleware::{oauth2_middleware, OAuth2Provider};
//! use oauth2_provider::store::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn handler() -> &'static str { "" }
//! let store = Arc::new(MemoryStore::new());
//! let provider = Arc::new(OAuth2Provider::new(OAuth2Config::default(), store));
//! let app: Router = Router::new()
//!     .route("/profile", get(handler))
//!     .fallback(|| async { "not found" })
//!     .layer(middleware::from_fn_with_state(provider, oauth2_middleware));
//! ```
//!
//! The protocol endpoints are answered by the middleware itself, so the
//! host router needs a fallback (or any route) for those paths to be
//! reachable through the layer.

use std::sync::Arc;

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::{header, HeaderMap, StatusCode};
use tracing::warn;
use uuid::Uuid;

use crate::clients::ClientResolver;
use crate::config::{OAuth2Config, ResourceAuthenticator};
use crate::errors::Challenge;
use crate::store::OAuth2Store;
use crate::{authorizer, resource, token};

/// Response header a host application sets to report a consent outcome;
/// the value is the in-flight authorization request id. Response status
/// 401 denies; anything else grants, with the body optionally naming the
/// authenticated resource.
pub const AUTHORIZATION_SENTINEL: &str = "oauth.authorization";

/// Response header a host application sets to demand an unauthenticated
/// challenge (converted to a 401 with a bare `WWW-Authenticate`)
pub const NO_ACCESS_SENTINEL: &str = "oauth.no_access";

/// Response header a host application sets beside a 403 to demand an
/// `insufficient_scope` challenge naming the scopes that would suffice
pub const NO_SCOPE_SENTINEL: &str = "oauth.no_scope";

/// Largest form body or consent response body the middleware will buffer
pub(crate) const BODY_LIMIT: usize = 64 * 1024;

/// Request extension: id of the pending authorization created by Phase A.
/// The host application round-trips this through its consent UI and echoes
/// it back in the [`AUTHORIZATION_SENTINEL`] header.
#[derive(Debug, Clone)]
pub struct PendingAuthorization(pub Uuid);

/// Request extension: what the consent screen should show
#[derive(Debug, Clone)]
pub struct ConsentView {
    /// Display name of the requesting client
    pub client_name: String,
    /// Individual scope names being requested
    pub scope: Vec<String>,
}

/// Request extension: identity behind a validated bearer token
#[derive(Debug, Clone)]
pub struct Authenticated {
    /// The access token that authenticated the request
    pub token: String,
    /// Resource (end user) the token acts on behalf of
    pub resource: String,
}

/// Shared state of the OAuth 2.0 middleware
pub struct OAuth2Provider {
    config: OAuth2Config,
    store: Arc<dyn OAuth2Store>,
    resolver: ClientResolver,
    authenticator: Option<Arc<dyn ResourceAuthenticator>>,
}

impl OAuth2Provider {
    /// Create a provider over a configuration and a store backend
    #[must_use]
    pub fn new(config: OAuth2Config, store: Arc<dyn OAuth2Store>) -> Self {
        let resolver = ClientResolver::new(store.clone());
        Self {
            config,
            store,
            resolver,
            authenticator: None,
        }
    }

    /// Wire in a resource-owner authenticator, enabling the password grant
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<dyn ResourceAuthenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Middleware configuration
    #[must_use]
    pub const fn config(&self) -> &OAuth2Config {
        &self.config
    }

    /// Store backend
    #[must_use]
    pub fn store(&self) -> &dyn OAuth2Store {
        self.store.as_ref()
    }

    pub(crate) const fn resolver(&self) -> &ClientResolver {
        &self.resolver
    }

    pub(crate) fn authenticator(&self) -> Option<&Arc<dyn ResourceAuthenticator>> {
        self.authenticator.as_ref()
    }

    /// Challenge realm: the configured value, else the request host
    pub(crate) fn realm(&self, headers: &HeaderMap) -> String {
        self.config.realm.clone().unwrap_or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_owned()
        })
    }
}

/// The dispatcher: classify the request and drive the matching component
pub async fn oauth2_middleware(
    State(provider): State<Arc<OAuth2Provider>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if path == provider.config().access_token_path {
        return token::issue(&provider, request).await;
    }
    if path == provider.config().authorize_path {
        return authorizer::authorize(&provider, request, next).await;
    }
    resource::guard(&provider, request, next).await
}

/// Buffer a form-encoded request body so both the decoder and the host
/// application can read it; non-form bodies pass through untouched
pub(crate) async fn buffer_form_body(headers: &HeaderMap, body: Body) -> (Option<Bytes>, Body) {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
    if !is_form {
        return (None, body);
    }
    match to_bytes(body, BODY_LIMIT).await {
        Ok(bytes) => (Some(bytes.clone()), Body::from(bytes)),
        Err(e) => {
            warn!(error = %e, "failed to buffer form body");
            (None, Body::empty())
        }
    }
}

/// 401/403 with a `WWW-Authenticate` challenge and an empty body
pub(crate) fn challenge_response(status: StatusCode, challenge: &Challenge) -> Response {
    (
        status,
        [(header::WWW_AUTHENTICATE, challenge.header_value())],
        Body::empty(),
    )
        .into_response()
}

/// Remove the host-app sentinel headers before a response leaves the
/// middleware
pub(crate) fn strip_sentinels(response: &mut Response) {
    for name in [AUTHORIZATION_SENTINEL, NO_ACCESS_SENTINEL, NO_SCOPE_SENTINEL] {
        response.headers_mut().remove(name);
    }
}
