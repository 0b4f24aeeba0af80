// ABOUTME: Token endpoint: authorization_code and password grants over form-encoded POSTs
// ABOUTME: Every outcome is JSON with Cache-Control: no-store; invalid_client over Basic gets a 401 challenge
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use axum::body::to_bytes;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::{header, Method, StatusCode};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::decoder::RequestDecoder;
use crate::errors::{Challenge, ErrorBody, ProtocolError, ProtocolResult};
use crate::middleware::{OAuth2Provider, BODY_LIMIT};
use crate::models::{normalize_scope, validate_scope, AccessToken, Client};
use crate::redirect::parse_redirect_uri;

/// Successful token response body; `scope` is omitted when empty
#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

/// Handle one token endpoint request
pub(crate) async fn issue(provider: &OAuth2Provider, request: Request) -> Response {
    if request.method() != Method::POST {
        return (StatusCode::METHOD_NOT_ALLOWED, Json("POST only")).into_response();
    }

    let (parts, body) = request.into_parts();
    let form = to_bytes(body, BODY_LIMIT).await.unwrap_or_default();
    let query = parts.uri.query();
    let decoder = RequestDecoder::new(&parts.headers, query, Some(&form));

    let client = match provider.resolver().resolve(&decoder).await {
        Ok(client) => client,
        Err(e) => {
            // a client that authenticated over Basic gets the matching
            // challenge; everything else is a plain 400 body
            if decoder.credentials().attempted_basic() {
                let realm = provider.realm(&parts.headers);
                let challenge = Challenge::new(realm).with_error(&e);
                return (
                    StatusCode::UNAUTHORIZED,
                    [
                        (header::WWW_AUTHENTICATE, challenge.header_value()),
                        (header::CACHE_CONTROL, "no-store".to_owned()),
                    ],
                    Json(ErrorBody::from(&e)),
                )
                    .into_response();
            }
            return error_response(&e);
        }
    };

    let result = match decoder.form_param("grant_type") {
        Some("authorization_code") => authorization_code_grant(provider, &decoder, &client).await,
        Some("password") => password_grant(provider, &decoder, &client).await,
        other => {
            warn!(client_id = %client.id, grant_type = ?other, "unsupported grant type");
            Err(ProtocolError::UnsupportedGrantType)
        }
    };

    match result {
        Ok(token) => {
            info!(client_id = %client.id, scope = %token.scope, "access token issued");
            success_response(&token)
        }
        Err(e) => error_response(&e),
    }
}

/// Redeem a one-shot authorization code for an access token
async fn authorization_code_grant(
    provider: &OAuth2Provider,
    decoder: &RequestDecoder,
    client: &Client,
) -> ProtocolResult<AccessToken> {
    let code = decoder
        .form_param("code")
        .filter(|code| !code.is_empty())
        .ok_or_else(|| ProtocolError::invalid_grant("missing authorization code"))?;

    let grant = provider
        .store()
        .find_grant(code)
        .await
        .map_err(|e| {
            error!(error = %e, "authorization code lookup failed");
            ProtocolError::invalid_grant("authorization code could not be verified")
        })?
        .ok_or_else(|| {
            warn!(client_id = %client.id, "unknown or expired authorization code");
            ProtocolError::invalid_grant("unknown or expired authorization code")
        })?;

    if grant.client_id != client.id {
        warn!(
            client_id = %client.id,
            grant_client_id = %grant.client_id,
            "authorization code presented by the wrong client"
        );
        return Err(ProtocolError::invalid_grant(
            "authorization code was issued to another client",
        ));
    }

    // a code delivered to a redirect URI is bound to it; the redeeming
    // call must name the identical URI
    if !grant.redirect_uri.is_empty() {
        let supplied = parse_redirect_uri(decoder.form_param("redirect_uri")).map_err(|_| {
            ProtocolError::invalid_grant("redirect URI is missing or malformed")
        })?;
        if supplied.as_str() != grant.redirect_uri {
            warn!(client_id = %client.id, "redirect URI does not match the authorization code");
            return Err(ProtocolError::invalid_grant(
                "redirect URI does not match the authorization code",
            ));
        }
    }

    provider
        .store()
        .redeem_grant(code)
        .await
        .map_err(|e| {
            error!(error = %e, "authorization code redemption failed");
            ProtocolError::invalid_grant("authorization code could not be redeemed")
        })?
        .ok_or_else(|| {
            // lost the race against a concurrent redemption of the same code
            warn!(client_id = %client.id, "authorization code already redeemed");
            ProtocolError::invalid_grant("authorization code already redeemed")
        })
}

/// Resource Owner Password Credentials grant; enabled only when the host
/// wired in an authenticator
async fn password_grant(
    provider: &OAuth2Provider,
    decoder: &RequestDecoder,
    client: &Client,
) -> ProtocolResult<AccessToken> {
    let Some(authenticator) = provider.authenticator() else {
        return Err(ProtocolError::UnsupportedGrantType);
    };

    let username = decoder
        .form_param("username")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ProtocolError::invalid_grant("missing username"))?;
    let password = decoder
        .form_param("password")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ProtocolError::invalid_grant("missing password"))?;

    let scope = normalize_scope(decoder.form_param("scope").unwrap_or(""));
    validate_scope(&scope, provider.config().scopes.as_deref())?;

    let resource = authenticator
        .authenticate(username, password)
        .await
        .map_err(|e| {
            error!(client_id = %client.id, error = %e, "resource owner authentication errored");
            ProtocolError::invalid_grant("credentials could not be verified")
        })?
        .ok_or_else(|| {
            warn!(client_id = %client.id, "resource owner credentials rejected");
            ProtocolError::invalid_grant("username and password do not match")
        })?;

    provider
        .store()
        .token_for(&resource, &client.id, &scope)
        .await
        .map_err(|e| {
            error!(client_id = %client.id, error = %e, "access token issuance failed");
            ProtocolError::invalid_request("access token could not be issued")
        })
}

/// 200 JSON success body
fn success_response(token: &AccessToken) -> Response {
    let body = TokenResponse {
        access_token: token.token.clone(),
        scope: if token.scope.is_empty() {
            None
        } else {
            Some(token.scope.clone())
        },
    };
    (
        StatusCode::OK,
        [(header::CACHE_CONTROL, "no-store")],
        Json(body),
    )
        .into_response()
}

/// 400 JSON error body
fn error_response(error: &ProtocolError) -> Response {
    (
        StatusCode::BAD_REQUEST,
        [(header::CACHE_CONTROL, "no-store")],
        Json(ErrorBody::from(error)),
    )
        .into_response()
}
