// ABOUTME: Client lookup and authentication for the authorize and token endpoints
// ABOUTME: Collapses every failure mode into invalid_client; secret comparison is constant-time
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::{error, warn};

use crate::decoder::{Credentials, RequestDecoder};
use crate::errors::{ProtocolError, ProtocolResult};
use crate::models::Client;
use crate::store::OAuth2Store;

/// Resolves and authenticates the client behind a protocol request
pub struct ClientResolver {
    store: Arc<dyn OAuth2Store>,
}

impl ClientResolver {
    /// Creates a resolver over the given store
    #[must_use]
    pub fn new(store: Arc<dyn OAuth2Store>) -> Self {
        Self { store }
    }

    /// Resolve the client named by the request's credentials.
    ///
    /// Credential source precedence: Basic header, then form body, then
    /// query string. Unknown client, wrong secret, and revoked registration
    /// all collapse into the same `invalid_client` so the response never
    /// reveals which check failed; the distinction goes to the log only.
    ///
    /// # Errors
    /// Returns `InvalidClient` on any failure.
    pub async fn resolve(&self, decoder: &RequestDecoder) -> ProtocolResult<Client> {
        let (client_id, client_secret) = select_credentials(decoder);

        if client_id.is_empty() {
            warn!("client resolution failed: no client_id in any credential source");
            return Err(ProtocolError::InvalidClient);
        }

        let client = self
            .store
            .find_client(&client_id)
            .await
            .map_err(|e| {
                error!(client_id = %client_id, error = %e, "client lookup failed");
                ProtocolError::InvalidClient
            })?
            .ok_or_else(|| {
                warn!(client_id = %client_id, "client resolution failed: unknown client");
                ProtocolError::InvalidClient
            })?;

        let secret_matches: bool = client
            .secret
            .as_bytes()
            .ct_eq(client_secret.as_bytes())
            .into();
        if !secret_matches {
            warn!(client_id = %client_id, "client resolution failed: secret mismatch");
            return Err(ProtocolError::InvalidClient);
        }

        if client.revoked {
            warn!(client_id = %client_id, "client resolution failed: client revoked");
            return Err(ProtocolError::InvalidClient);
        }

        Ok(client)
    }
}

/// Pick the `(client_id, client_secret)` pair by source precedence
fn select_credentials(decoder: &RequestDecoder) -> (String, String) {
    if let Credentials::Basic { username, password } = decoder.credentials() {
        return (username.clone(), password.clone());
    }
    let (form_id, form_secret) = decoder.form_client();
    if !form_id.is_empty() {
        return (form_id, form_secret);
    }
    decoder.query_client()
}
