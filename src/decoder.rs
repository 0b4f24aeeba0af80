// ABOUTME: Credential and parameter extraction from HTTP requests
// ABOUTME: Reads the Authorization header (plus proxy variants), form bodies, and query strings
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Request decoding
//!
//! The decoder is deliberately infallible: missing or malformed fields come
//! back as empty values, and the components downstream translate those into
//! the appropriate protocol failure (`invalid_client`, missing token, ...).

use std::collections::HashMap;

use base64::{engine::general_purpose, Engine as _};
use http::HeaderMap;

/// Header names inspected for client credentials and bearer tokens: the
/// canonical name plus the two proxy variants that survive common rewrites
const AUTHORIZATION_HEADERS: [&str; 3] =
    ["authorization", "x-http-authorization", "x_http_authorization"];

/// Parameter carrying a bearer token outside the Authorization header
const OAUTH_TOKEN_PARAM: &str = "oauth_token";

/// Credentials carried by an Authorization-style header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// `Basic` scheme; empty fields when the payload did not decode
    Basic {
        /// Client identifier half of the pair
        username: String,
        /// Client secret half of the pair
        password: String,
    },
    /// `OAuth` or `Bearer` scheme
    Bearer(String),
    /// No recognizable Authorization header present
    None,
}

impl Credentials {
    /// Whether the caller attempted HTTP Basic authentication, successfully
    /// decoded or not. The token endpoint keys its 401-challenge rule on this.
    #[must_use]
    pub const fn attempted_basic(&self) -> bool {
        matches!(self, Self::Basic { .. })
    }
}

/// Pure accessors over one HTTP request's credential carriers
#[derive(Debug)]
pub struct RequestDecoder {
    credentials: Credentials,
    query: HashMap<String, String>,
    form: HashMap<String, String>,
}

impl RequestDecoder {
    /// Decode a request from its headers, raw query string, and (when the
    /// caller buffered one) form-encoded body
    #[must_use]
    pub fn new(headers: &HeaderMap, query: Option<&str>, form: Option<&[u8]>) -> Self {
        Self {
            credentials: decode_authorization(headers),
            query: query.map(|q| parse_params(q.as_bytes())).unwrap_or_default(),
            form: form.map(parse_params).unwrap_or_default(),
        }
    }

    /// Credentials from the Authorization header (or a proxy variant)
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// `(client_id, client_secret)` from the form body; missing fields are
    /// empty strings
    #[must_use]
    pub fn form_client(&self) -> (String, String) {
        client_pair(&self.form)
    }

    /// `(client_id, client_secret)` from the query string; missing fields
    /// are empty strings
    #[must_use]
    pub fn query_client(&self) -> (String, String) {
        client_pair(&self.query)
    }

    /// Bearer token for resource access: the Authorization header wins,
    /// falling back to `oauth_token` in the query string or form body
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        if let Credentials::Bearer(token) = &self.credentials {
            if !token.is_empty() {
                return Some(token);
            }
        }
        self.query
            .get(OAUTH_TOKEN_PARAM)
            .or_else(|| self.form.get(OAUTH_TOKEN_PARAM))
            .map(String::as_str)
            .filter(|token| !token.is_empty())
    }

    /// Single parameter from the query string
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Single parameter from the form body
    #[must_use]
    pub fn form_param(&self, name: &str) -> Option<&str> {
        self.form.get(name).map(String::as_str)
    }
}

/// Decode the first recognizable Authorization-style header
fn decode_authorization(headers: &HeaderMap) -> Credentials {
    for name in AUTHORIZATION_HEADERS {
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        let mut parts = value.trim().splitn(2, ' ');
        let scheme = parts.next().unwrap_or_default();
        let payload = parts.next().unwrap_or_default().trim();

        if scheme.eq_ignore_ascii_case("basic") {
            return decode_basic(payload);
        }
        if scheme.eq_ignore_ascii_case("oauth") || scheme.eq_ignore_ascii_case("bearer") {
            return Credentials::Bearer(payload.to_owned());
        }
    }
    Credentials::None
}

/// Decode a Basic payload into `username:password`; undecodable payloads
/// yield empty fields so the attempt itself stays visible
fn decode_basic(payload: &str) -> Credentials {
    let decoded = general_purpose::STANDARD
        .decode(payload)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default();
    let (username, password) = decoded.split_once(':').unwrap_or((decoded.as_str(), ""));
    Credentials::Basic {
        username: username.to_owned(),
        password: password.to_owned(),
    }
}

/// Parse urlencoded parameters; repeated names keep the last value
fn parse_params(input: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(input)
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect()
}

/// `(client_id, client_secret)` with empty-string defaults
fn client_pair(params: &HashMap<String, String>) -> (String, String) {
    (
        params.get("client_id").cloned().unwrap_or_default(),
        params.get("client_secret").cloned().unwrap_or_default(),
    )
}
