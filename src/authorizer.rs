// ABOUTME: Authorize endpoint: pre-consent validation, consent hand-off, and finalization
// ABOUTME: Redirect-unsafe failures answer 400 plaintext; everything after URI validation redirects
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Authorizer
//!
//! The authorize endpoint is a three-phase state machine. Phase A validates
//! the request, records a pending [`AuthRequest`] and delegates to the host
//! application, which owns user authentication and the consent UI. Phase B
//! is opaque to this crate. Phase C runs when a host response carries the
//! [`AUTHORIZATION_SENTINEL`](crate::middleware::AUTHORIZATION_SENTINEL)
//! header: the record transitions to granted or denied and a 302 delivers
//! the outcome to the client's redirect URI.
//!
//! The one failure that never redirects is an unusable redirect URI: the
//! redirect target itself is untrusted, so the response is a plain 400.

use axum::body::to_bytes;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::{header, StatusCode};
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::decoder::RequestDecoder;
use crate::errors::ProtocolError;
use crate::middleware::{
    buffer_form_body, strip_sentinels, ConsentView, OAuth2Provider, PendingAuthorization,
    AUTHORIZATION_SENTINEL, BODY_LIMIT,
};
use crate::models::{
    normalize_scope, scope_names, validate_scope, AuthRequest, AuthRequestStatus, NewAuthRequest,
    ResponseType,
};
use crate::redirect::{parse_redirect_uri, with_fragment_params, with_query_params};

/// Phase A followed by the consent hand-off
pub(crate) async fn authorize(
    provider: &OAuth2Provider,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let query = parts.uri.query().map(str::to_owned);
    let (form, body) = buffer_form_body(&parts.headers, body).await;
    let decoder = RequestDecoder::new(&parts.headers, query.as_deref(), form.as_deref());

    // 1. The redirect URI comes first: until it validates there is nowhere
    //    safe to deliver an error, so failure here is a plain 400.
    let redirect_uri = match parse_redirect_uri(decoder.query_param("redirect_uri")) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "authorize request rejected: unusable redirect URI");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    // 2. State is opaque and echoed on every response from here on.
    let state = decoder.query_param("state").map(str::to_owned);

    // 3. Client resolution; failures redirect as invalid_client.
    let client = match provider.resolver().resolve(&decoder).await {
        Ok(client) => client,
        Err(e) => return error_redirect(&redirect_uri, &e, state.as_deref()),
    };

    // 4. A pre-registered redirect URI must match the supplied one exactly.
    //    Clients registered without one accept any validated URI.
    if let Some(registered) = &client.redirect_uri {
        if registered != redirect_uri.as_str() {
            warn!(
                client_id = %client.id,
                supplied = %redirect_uri,
                "authorize request rejected: redirect URI mismatch"
            );
            return error_redirect(
                &redirect_uri,
                &ProtocolError::RedirectUriMismatch,
                state.as_deref(),
            );
        }
    }

    // 5. Scope normalization and allow-list validation.
    let scope = normalize_scope(decoder.query_param("scope").unwrap_or(""));
    if let Err(e) = validate_scope(&scope, provider.config().scopes.as_deref()) {
        return error_redirect(&redirect_uri, &e, state.as_deref());
    }

    // 6. Response type must be recognized and enabled.
    let response_type = decoder
        .query_param("response_type")
        .and_then(ResponseType::parse)
        .filter(|rt| provider.config().authorization_types.contains(rt));
    let Some(response_type) = response_type else {
        return error_redirect(
            &redirect_uri,
            &ProtocolError::UnsupportedResponseType,
            state.as_deref(),
        );
    };

    // 7. Record the pending authorization and hand off to the host app.
    let auth_request = match provider
        .store()
        .create_auth_request(NewAuthRequest {
            client_id: client.id.clone(),
            scope: scope.clone(),
            redirect_uri: redirect_uri.as_str().to_owned(),
            response_type,
            state,
        })
        .await
    {
        Ok(auth_request) => auth_request,
        Err(e) => {
            error!(error = %e, "failed to record authorization request");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "authorization request could not be recorded",
            )
                .into_response();
        }
    };

    info!(
        authorization = %auth_request.id,
        client_id = %client.id,
        response_type = response_type.as_str(),
        scope = %scope,
        "authorization pending consent"
    );

    parts.extensions.insert(PendingAuthorization(auth_request.id));
    parts.extensions.insert(ConsentView {
        client_name: client.display_name,
        scope: scope_names(&scope),
    });

    let response = next.run(Request::from_parts(parts, body)).await;
    finalize_if_signaled(provider, response).await
}

/// Run Phase C when the host response carries the consent sentinel,
/// otherwise return the response untouched (minus sentinels)
pub(crate) async fn finalize_if_signaled(
    provider: &OAuth2Provider,
    mut response: Response,
) -> Response {
    if response.headers().contains_key(AUTHORIZATION_SENTINEL) {
        finalize(provider, response).await
    } else {
        strip_sentinels(&mut response);
        response
    }
}

/// Phase C: transition the named record and redirect the outcome.
///
/// Status 401 denies; any other status grants, with the response body
/// optionally naming the authenticated resource. Repeated finalizations of
/// one id re-emit the first outcome: the store's transition is conditional
/// on `pending` and returns terminal records unchanged.
pub(crate) async fn finalize(provider: &OAuth2Provider, response: Response) -> Response {
    let id = response
        .headers()
        .get(AUTHORIZATION_SENTINEL)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok());
    let Some(id) = id else {
        warn!("consent response carried an unparseable authorization id");
        return unknown_authorization();
    };

    let denied = response.status() == StatusCode::UNAUTHORIZED;
    let outcome = if denied {
        provider.store().deny_auth_request(id).await
    } else {
        let resource = read_resource_body(response).await;
        provider.store().grant_auth_request(id, &resource).await
    };

    match outcome {
        Ok(Some(auth_request)) => {
            info!(
                authorization = %auth_request.id,
                status = ?auth_request.status,
                "authorization finalized"
            );
            outcome_redirect(&auth_request)
        }
        Ok(None) => {
            warn!(authorization = %id, "consent response named an unknown or expired authorization");
            unknown_authorization()
        }
        Err(e) => {
            error!(authorization = %id, error = %e, "failed to finalize authorization");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "authorization could not be finalized",
            )
                .into_response()
        }
    }
}

/// Read the host's grant response body, which optionally names the resource
async fn read_resource_body(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).trim().to_owned()
}

/// 400 for a consent response whose id cannot be resolved; with no record
/// there is no redirect URI to deliver an error to
fn unknown_authorization() -> Response {
    (StatusCode::BAD_REQUEST, "unknown authorization request").into_response()
}

/// Build the 302 delivering a finalized authorization's outcome
fn outcome_redirect(auth_request: &AuthRequest) -> Response {
    let base = match Url::parse(&auth_request.redirect_uri) {
        Ok(url) => url,
        Err(e) => {
            // the stored URI was validated in Phase A; failure here means
            // the record was tampered with between phases
            error!(
                authorization = %auth_request.id,
                error = %e,
                "stored redirect URI no longer parses"
            );
            return unknown_authorization();
        }
    };
    let state = auth_request.state.as_deref();

    match auth_request.status {
        AuthRequestStatus::Granted => match auth_request.response_type {
            ResponseType::Code => {
                let code = auth_request.grant_code.as_deref().unwrap_or_default();
                let mut params = vec![("code", code), ("scope", auth_request.scope.as_str())];
                if let Some(state) = state {
                    params.push(("state", state));
                }
                redirect(&with_query_params(&base, &params))
            }
            ResponseType::Token => {
                let token = auth_request.access_token.as_deref().unwrap_or_default();
                let mut params =
                    vec![("access_token", token), ("scope", auth_request.scope.as_str())];
                if let Some(state) = state {
                    params.push(("state", state));
                }
                redirect(&with_fragment_params(&base, &params))
            }
        },
        AuthRequestStatus::Denied => {
            let mut params = vec![("error", "access_denied")];
            if let Some(state) = state {
                params.push(("state", state));
            }
            redirect(&with_query_params(&base, &params))
        }
        AuthRequestStatus::Pending => {
            // the store returned a record it did not transition
            error!(authorization = %auth_request.id, "finalization left the record pending");
            unknown_authorization()
        }
    }
}

/// Redirect a Phase A failure to the (already validated) redirect URI
fn error_redirect(redirect_uri: &Url, error: &ProtocolError, state: Option<&str>) -> Response {
    let description = error.to_string();
    let mut params = vec![
        ("error", error.wire_code()),
        ("error_description", description.as_str()),
    ];
    if let Some(state) = state {
        params.push(("state", state));
    }
    redirect(&with_query_params(redirect_uri, &params))
}

/// Plain 302 to the assembled callback URI
fn redirect(url: &Url) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, url.as_str().to_owned())],
        axum::body::Body::empty(),
    )
        .into_response()
}
