// ABOUTME: Shared test fixture: provider over a memory store, wrapped around a small host app
// ABOUTME: Provides request helpers and redirect/fragment parsing for the protocol tests
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `oauth2_provider`
//!
//! The host application modeled here exposes a consent view on the
//! authorize path, grant/deny consent endpoints, a protected profile, a
//! scope-demanding listing, and one public page.

use std::collections::HashMap;
use std::sync::{Arc, Once};

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::Form;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use http::{header, HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;

use oauth2_provider::config::{OAuth2Config, ResourceAuthenticator};
use oauth2_provider::middleware::{
    oauth2_middleware, Authenticated, ConsentView, OAuth2Provider, PendingAuthorization,
    AUTHORIZATION_SENTINEL, NO_ACCESS_SENTINEL, NO_SCOPE_SENTINEL,
};
use oauth2_provider::models::Client;
use oauth2_provider::store::MemoryStore;

/// The registered client every scenario starts from
pub const CLIENT_ID: &str = "4b7a1d2e9f3c4851a06e7d5b8c2f9e13";
pub const CLIENT_SECRET: &str = "tellnoone";
pub const CLIENT_NAME: &str = "UberClient";
pub const CALLBACK: &str = "http://uberclient.dot/callback";

/// A second client registered without a redirect URI
pub const FREEFORM_CLIENT_ID: &str = "8d21c5a7e94b4f308b16d3a0c7e5f246";
pub const FREEFORM_CLIENT_SECRET: &str = "alsosecret";

pub const STATE: &str = "bring this back";
pub const HOST: &str = "provider.dot";

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .init();
    });
}

/// Password-grant authenticator accepting a single known user
pub struct TestAuthenticator;

#[async_trait]
impl ResourceAuthenticator for TestAuthenticator {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> anyhow::Result<Option<String>> {
        if username == "ada" && password == "lovelace" {
            Ok(Some("user-ada".to_owned()))
        } else {
            Ok(None)
        }
    }
}

/// Middleware-wrapped host application plus direct store access
pub struct TestHarness {
    pub app: Router,
    pub store: Arc<MemoryStore>,
}

/// Default configuration used by the scenarios: scopes restricted to
/// read/write/list, realm taken from the request host
pub fn test_config() -> OAuth2Config {
    OAuth2Config {
        scopes: Some(vec!["read".to_owned(), "write".to_owned(), "list".to_owned()]),
        ..OAuth2Config::default()
    }
}

pub async fn harness() -> TestHarness {
    harness_custom(test_config(), Arc::new(MemoryStore::new()), true).await
}

pub async fn harness_with_config(config: OAuth2Config) -> TestHarness {
    harness_custom(config, Arc::new(MemoryStore::new()), true).await
}

pub async fn harness_without_authenticator() -> TestHarness {
    harness_custom(test_config(), Arc::new(MemoryStore::new()), false).await
}

/// Build the full stack over an explicit store (for TTL-tweaked backends)
pub async fn harness_custom(
    config: OAuth2Config,
    store: Arc<MemoryStore>,
    with_authenticator: bool,
) -> TestHarness {
    init_test_logging();

    store
        .add_client(Client {
            id: CLIENT_ID.to_owned(),
            secret: CLIENT_SECRET.to_owned(),
            redirect_uri: Some(CALLBACK.to_owned()),
            display_name: CLIENT_NAME.to_owned(),
            revoked: false,
        })
        .await;
    store
        .add_client(Client {
            id: FREEFORM_CLIENT_ID.to_owned(),
            secret: FREEFORM_CLIENT_SECRET.to_owned(),
            redirect_uri: None,
            display_name: "FreeForm".to_owned(),
            revoked: false,
        })
        .await;

    let mut provider = OAuth2Provider::new(config, store.clone());
    if with_authenticator {
        provider = provider.with_authenticator(Arc::new(TestAuthenticator));
    }

    let app = host_app().layer(middleware::from_fn_with_state(
        Arc::new(provider),
        oauth2_middleware,
    ));

    TestHarness { app, store }
}

/// The host application sitting behind the middleware
fn host_app() -> Router {
    Router::new()
        .route("/oauth/authorize", get(consent_view).post(consent_view))
        .route("/oauth/grant", post(consent_grant))
        .route("/oauth/deny", post(consent_deny))
        .route("/profile", get(profile))
        .route("/listing", get(listing))
        .route("/public", get(|| async { "open to everyone" }))
        .fallback(|| async { (StatusCode::NOT_FOUND, "nothing here") })
}

/// Consent screen: echoes what the middleware attached to the request
async fn consent_view(
    Extension(pending): Extension<PendingAuthorization>,
    Extension(view): Extension<ConsentView>,
) -> Json<Value> {
    Json(json!({
        "authorization": pending.0.to_string(),
        "client": view.client_name,
        "scope": view.scope,
    }))
}

/// Consent accepted: report the grant through the sentinel header, naming
/// the authenticated resource in the body
async fn consent_grant(Form(params): Form<HashMap<String, String>>) -> impl IntoResponse {
    let id = params.get("authorization").cloned().unwrap_or_default();
    let resource = params.get("resource").cloned().unwrap_or_default();
    ([(AUTHORIZATION_SENTINEL, id)], resource)
}

/// Consent refused: 401 with the sentinel header denies
async fn consent_deny(Form(params): Form<HashMap<String, String>>) -> impl IntoResponse {
    let id = params.get("authorization").cloned().unwrap_or_default();
    (
        StatusCode::UNAUTHORIZED,
        [(AUTHORIZATION_SENTINEL, id)],
        Body::empty(),
    )
}

/// Protected page: demands authentication via the no-access sentinel
async fn profile(auth: Option<Extension<Authenticated>>) -> axum::response::Response {
    match auth {
        Some(Extension(auth)) => Json(json!({
            "resource": auth.resource,
            "token": auth.token,
        }))
        .into_response(),
        None => ([(NO_ACCESS_SENTINEL, "1")], Body::empty()).into_response(),
    }
}

/// Page that always demands the `list` scope on top of `read`
async fn listing() -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        [(NO_SCOPE_SENTINEL, "read list")],
        Body::empty(),
    )
}

/// Response captured from one `oneshot` round trip
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn location(&self) -> Url {
        let location = self
            .headers
            .get(header::LOCATION)
            .expect("response carries no Location header")
            .to_str()
            .unwrap();
        Url::parse(location).expect("Location is not an absolute URL")
    }

    pub fn www_authenticate(&self) -> String {
        self.headers
            .get(header::WWW_AUTHENTICATE)
            .expect("response carries no WWW-Authenticate header")
            .to_str()
            .unwrap()
            .to_owned()
    }
}

/// Drive one request through the middleware-wrapped host app
pub async fn send(harness: &TestHarness, request: Request<Body>) -> TestResponse {
    let response = harness
        .app
        .clone()
        .oneshot(request)
        .await
        .expect("request failed");
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("failed to read response body")
        .to_bytes();
    TestResponse {
        status,
        headers,
        body,
    }
}

/// Standard authorize query for the registered client
pub fn authorize_query(response_type: &str, redirect_uri: &str) -> String {
    authorize_query_for(CLIENT_ID, CLIENT_SECRET, response_type, redirect_uri, "read write")
}

pub fn authorize_query_for(
    client_id: &str,
    client_secret: &str,
    response_type: &str,
    redirect_uri: &str,
    scope: &str,
) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("response_type", response_type)
        .append_pair("client_id", client_id)
        .append_pair("client_secret", client_secret)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", scope)
        .append_pair("state", STATE)
        .finish()
}

pub async fn get_authorize(harness: &TestHarness, query: &str) -> TestResponse {
    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/oauth/authorize?{query}"))
        .header(header::HOST, HOST)
        .body(Body::empty())
        .unwrap();
    send(harness, request).await
}

/// POST the consent outcome back through the host app
pub async fn post_consent(
    harness: &TestHarness,
    path: &str,
    authorization: &str,
    resource: Option<&str>,
) -> TestResponse {
    let mut form = url::form_urlencoded::Serializer::new(String::new());
    form.append_pair("authorization", authorization);
    if let Some(resource) = resource {
        form.append_pair("resource", resource);
    }
    let request = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::HOST, HOST)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.finish()))
        .unwrap();
    send(harness, request).await
}

/// POST a form to the token endpoint
pub async fn post_token(harness: &TestHarness, form: &[(&str, &str)]) -> TestResponse {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(form.iter().copied())
        .finish();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/oauth/access_token")
        .header(header::HOST, HOST)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();
    send(harness, request).await
}

/// Full happy-path authorize + consent, returning the issued code
pub async fn obtain_authorization_code(harness: &TestHarness) -> String {
    let consent = get_authorize(harness, &authorize_query("code", CALLBACK)).await;
    assert_eq!(consent.status, StatusCode::OK);
    let authorization = consent.json()["authorization"]
        .as_str()
        .expect("consent view names the authorization")
        .to_owned();

    let redirect = post_consent(harness, "/oauth/grant", &authorization, Some("user-ada")).await;
    assert_eq!(redirect.status, StatusCode::FOUND);
    query_params(&redirect.location())
        .remove("code")
        .expect("grant redirect carries a code")
}

/// Query parameters of a callback URI
pub fn query_params(url: &Url) -> HashMap<String, String> {
    url.query_pairs().into_owned().collect()
}

/// Fragment parameters of a callback URI (implicit flow)
pub fn fragment_params(url: &Url) -> HashMap<String, String> {
    url.fragment()
        .map(|fragment| {
            url::form_urlencoded::parse(fragment.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

/// Whether a value looks like an issued code or token: 32 hex characters
pub fn is_hex32(value: &str) -> bool {
    value.len() == 32 && value.chars().all(|c| c.is_ascii_hexdigit())
}
