// ABOUTME: Redirect URI validation and callback URI assembly
// ABOUTME: Requires absolute hierarchical URIs and merges server parameters into query or fragment
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use url::Url;

use crate::errors::{ProtocolError, ProtocolResult};

/// Validate a client-supplied redirect URI.
///
/// The URI must be absolute and hierarchical (carry a `//authority` with a
/// host), and must not carry a fragment. Query parameters are preserved;
/// the server merges its own parameters next to them later.
///
/// # Errors
/// Returns `InvalidRequest` when the string is absent, the URI is relative,
/// the authority is missing (`http:not-valid`), or a fragment is present.
pub fn parse_redirect_uri(raw: Option<&str>) -> ProtocolResult<Url> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProtocolError::invalid_request("missing redirect URI"))?;

    let url = Url::parse(raw).map_err(|_| {
        ProtocolError::invalid_request("redirect URI must be an absolute URI")
    })?;

    // WHATWG parsing quietly inserts the authority slashes for special
    // schemes ("http:host" becomes "http://host"), so the hierarchical
    // requirement is checked against the raw text.
    if !raw[url.scheme().len()..].starts_with("://") {
        return Err(ProtocolError::invalid_request(
            "redirect URI must carry a host",
        ));
    }
    if url.cannot_be_a_base() || url.host_str().map_or(true, str::is_empty) {
        return Err(ProtocolError::invalid_request(
            "redirect URI must carry a host",
        ));
    }
    if url.fragment().is_some() {
        return Err(ProtocolError::invalid_request(
            "redirect URI must not carry a fragment",
        ));
    }

    Ok(url)
}

/// Append server parameters to the callback URI's query, preserving any
/// query parameters the client registered on it
#[must_use]
pub fn with_query_params(base: &Url, params: &[(&str, &str)]) -> Url {
    let mut url = base.clone();
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params.iter().copied());
    }
    url
}

/// Place server parameters in the callback URI's fragment (implicit flow)
#[must_use]
pub fn with_fragment_params(base: &Url, params: &[(&str, &str)]) -> Url {
    let mut url = base.clone();
    let fragment = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().copied())
        .finish();
    url.set_fragment(Some(&fragment));
    url
}
