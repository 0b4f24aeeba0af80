// ABOUTME: Resource gate: bearer-token verification for every non-protocol path
// ABOUTME: Translates host-app sentinels into WWW-Authenticate challenges; internal failures stay bare
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use http::StatusCode;
use tracing::{debug, warn};

use crate::authorizer;
use crate::decoder::RequestDecoder;
use crate::errors::{Challenge, ProtocolError};
use crate::middleware::{
    buffer_form_body, challenge_response, strip_sentinels, Authenticated, OAuth2Provider,
    AUTHORIZATION_SENTINEL, NO_ACCESS_SENTINEL, NO_SCOPE_SENTINEL,
};
use crate::models::normalize_scope;

/// How a presented bearer token failed validation
enum TokenFailure {
    /// Protocol-level failure, safe to name in the challenge
    Protocol(ProtocolError),
    /// Backend failure; the challenge stays bare so nothing leaks
    Internal,
}

/// Guard one resource request
pub(crate) async fn guard(provider: &OAuth2Provider, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let realm = provider.realm(&parts.headers);
    let query = parts.uri.query().map(str::to_owned);
    let (form, body) = buffer_form_body(&parts.headers, body).await;
    let decoder = RequestDecoder::new(&parts.headers, query.as_deref(), form.as_deref());

    let Some(bearer) = decoder.bearer_token().map(str::to_owned) else {
        // unauthenticated: the host app decides whether that is acceptable
        let response = next.run(Request::from_parts(parts, body)).await;
        return postprocess(provider, &realm, response).await;
    };

    let token = match validate_token(provider, &bearer).await {
        Ok(token) => token,
        Err(TokenFailure::Protocol(e)) => {
            return challenge_response(
                StatusCode::UNAUTHORIZED,
                &Challenge::new(&realm).with_error(&e),
            );
        }
        Err(TokenFailure::Internal) => {
            return challenge_response(StatusCode::UNAUTHORIZED, &Challenge::new(&realm));
        }
    };

    debug!(resource = %token.resource, "bearer token accepted");
    parts.extensions.insert(Authenticated {
        token: token.token,
        resource: token.resource,
    });

    let response = next.run(Request::from_parts(parts, body)).await;
    postprocess(provider, &realm, response).await
}

/// Look the token up and judge it: it must exist, not be revoked, and not
/// be past its expiry
async fn validate_token(
    provider: &OAuth2Provider,
    bearer: &str,
) -> Result<crate::models::AccessToken, TokenFailure> {
    let token = match provider.store().find_token(bearer).await {
        Ok(token) => token,
        Err(e) => {
            warn!(error = %e, "bearer token lookup failed");
            return Err(TokenFailure::Internal);
        }
    };
    let Some(token) = token else {
        warn!("bearer token not recognized");
        return Err(TokenFailure::Protocol(ProtocolError::InvalidToken(
            "access token is not valid".into(),
        )));
    };
    if token.revoked {
        warn!(resource = %token.resource, "revoked bearer token presented");
        return Err(TokenFailure::Protocol(ProtocolError::InvalidToken(
            "access token is not valid".into(),
        )));
    }
    if token.is_expired(Utc::now()) {
        warn!(resource = %token.resource, "expired bearer token presented");
        return Err(TokenFailure::Protocol(ProtocolError::ExpiredToken));
    }
    Ok(token)
}

/// Translate host-app sentinels on the way out
///
/// Order matters: a consent outcome beats everything, then the demand for
/// authentication, then the insufficient-scope rewrite; a response with no
/// sentinel passes through verbatim.
async fn postprocess(provider: &OAuth2Provider, realm: &str, mut response: Response) -> Response {
    if response.headers().contains_key(AUTHORIZATION_SENTINEL) {
        return authorizer::finalize(provider, response).await;
    }

    if response.headers().contains_key(NO_ACCESS_SENTINEL) {
        return challenge_response(StatusCode::UNAUTHORIZED, &Challenge::new(realm));
    }

    if response.status() == StatusCode::FORBIDDEN {
        if let Some(scope) = no_scope_value(&response) {
            let challenge =
                Challenge::new(realm).with_error(&ProtocolError::InsufficientScope(scope));
            return challenge_response(StatusCode::FORBIDDEN, &challenge);
        }
    }

    strip_sentinels(&mut response);
    response
}

/// Collect the `oauth.no_scope` header into one space-joined scope string;
/// the host may send a single value, a comma-separated list, or repeat the
/// header
fn no_scope_value(response: &Response) -> Option<String> {
    let mut names = String::new();
    for value in response.headers().get_all(NO_SCOPE_SENTINEL) {
        if let Ok(value) = value.to_str() {
            names.push_str(&value.replace(',', " "));
            names.push(' ');
        }
    }
    if names.trim().is_empty() {
        None
    } else {
        Some(normalize_scope(&names))
    }
}
