// ABOUTME: In-memory OAuth2Store backend for tests, demos, and single-process deployments
// ABOUTME: RwLock-guarded maps; lifecycle transitions happen under the write lock
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    generate_secure_token, AccessGrant, AccessToken, AuthRequest, AuthRequestStatus, Client,
    NewAuthRequest, ResponseType,
};
use crate::store::OAuth2Store;

/// In-memory [`OAuth2Store`] backend
///
/// Atomicity comes from taking the write lock for the whole lifecycle
/// transition, which is exactly what the contracts in [`crate::store`]
/// require of real backends (conditional update, one-shot redemption,
/// token-triple uniqueness).
pub struct MemoryStore {
    clients: RwLock<HashMap<String, Client>>,
    auth_requests: RwLock<HashMap<Uuid, AuthRequest>>,
    grants: RwLock<HashMap<String, AccessGrant>>,
    tokens: RwLock<HashMap<String, AccessToken>>,
    auth_request_ttl: Option<Duration>,
    grant_ttl: Duration,
    access_token_ttl: Option<Duration>,
}

impl MemoryStore {
    /// Create an empty store with the default lifetimes: pending
    /// authorization requests expire after 10 minutes, codes after
    /// 5 minutes, tokens never
    #[must_use]
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            auth_requests: RwLock::new(HashMap::new()),
            grants: RwLock::new(HashMap::new()),
            tokens: RwLock::new(HashMap::new()),
            auth_request_ttl: Some(Duration::minutes(10)),
            grant_ttl: Duration::minutes(5),
            access_token_ttl: None,
        }
    }

    /// Override the pending authorization request lifetime; `None` keeps
    /// pending records forever
    #[must_use]
    pub const fn with_auth_request_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.auth_request_ttl = ttl;
        self
    }

    /// Override the authorization code lifetime
    #[must_use]
    pub const fn with_grant_ttl(mut self, ttl: Duration) -> Self {
        self.grant_ttl = ttl;
        self
    }

    /// Override the access token lifetime; `None` issues non-expiring tokens
    #[must_use]
    pub const fn with_access_token_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    /// Register a client (client provisioning itself is outside the
    /// protocol core, so this lives on the backend, not the trait)
    pub async fn add_client(&self, client: Client) {
        self.clients.write().await.insert(client.id.clone(), client);
    }

    /// Whether a pending record has outlived the configured TTL
    fn pending_expired(&self, request: &AuthRequest, now: DateTime<Utc>) -> bool {
        request.status == AuthRequestStatus::Pending
            && self
                .auth_request_ttl
                .is_some_and(|ttl| request.created_at + ttl <= now)
    }

    /// Find or mint the live token for a triple inside an already-locked map
    fn live_token_locked(
        tokens: &mut HashMap<String, AccessToken>,
        resource: &str,
        client_id: &str,
        scope: &str,
        access_token_ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<AccessToken> {
        let existing = tokens.values().find(|t| {
            t.resource == resource
                && t.client_id == client_id
                && t.scope == scope
                && !t.revoked
                && !t.is_expired(now)
        });
        if let Some(token) = existing {
            return Ok(token.clone());
        }

        let token = AccessToken {
            token: generate_secure_token()?,
            resource: resource.to_owned(),
            client_id: client_id.to_owned(),
            scope: scope.to_owned(),
            created_at: now,
            expires_at: access_token_ttl.map(|ttl| now + ttl),
            revoked: false,
        };
        tokens.insert(token.token.clone(), token.clone());
        Ok(token)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OAuth2Store for MemoryStore {
    async fn find_client(&self, client_id: &str) -> Result<Option<Client>> {
        Ok(self.clients.read().await.get(client_id).cloned())
    }

    async fn revoke_client(&self, client_id: &str) -> Result<()> {
        if let Some(client) = self.clients.write().await.get_mut(client_id) {
            client.revoked = true;
        }
        Ok(())
    }

    async fn create_auth_request(&self, new: NewAuthRequest) -> Result<AuthRequest> {
        let request = AuthRequest {
            id: Uuid::new_v4(),
            client_id: new.client_id,
            scope: new.scope,
            redirect_uri: new.redirect_uri,
            response_type: new.response_type,
            state: new.state,
            grant_code: None,
            access_token: None,
            status: AuthRequestStatus::Pending,
            created_at: Utc::now(),
        };
        self.auth_requests
            .write()
            .await
            .insert(request.id, request.clone());
        Ok(request)
    }

    async fn find_auth_request(&self, id: Uuid) -> Result<Option<AuthRequest>> {
        let now = Utc::now();
        Ok(self
            .auth_requests
            .read()
            .await
            .get(&id)
            .filter(|request| !self.pending_expired(request, now))
            .cloned())
    }

    async fn grant_auth_request(
        &self,
        id: Uuid,
        resource: &str,
    ) -> Result<Option<AuthRequest>> {
        let now = Utc::now();
        let mut auth_requests = self.auth_requests.write().await;
        let Some(request) = auth_requests.get_mut(&id) else {
            return Ok(None);
        };
        if self.pending_expired(request, now) {
            return Ok(None);
        }
        if request.status != AuthRequestStatus::Pending {
            return Ok(Some(request.clone()));
        }

        match request.response_type {
            ResponseType::Code => {
                let grant = AccessGrant {
                    code: generate_secure_token()?,
                    client_id: request.client_id.clone(),
                    resource: resource.to_owned(),
                    scope: request.scope.clone(),
                    redirect_uri: request.redirect_uri.clone(),
                    expires_at: now + self.grant_ttl,
                };
                request.grant_code = Some(grant.code.clone());
                self.grants.write().await.insert(grant.code.clone(), grant);
            }
            ResponseType::Token => {
                let mut tokens = self.tokens.write().await;
                let token = Self::live_token_locked(
                    &mut tokens,
                    resource,
                    &request.client_id,
                    &request.scope,
                    self.access_token_ttl,
                    now,
                )?;
                request.access_token = Some(token.token);
            }
        }
        request.status = AuthRequestStatus::Granted;
        Ok(Some(request.clone()))
    }

    async fn deny_auth_request(&self, id: Uuid) -> Result<Option<AuthRequest>> {
        let now = Utc::now();
        let mut auth_requests = self.auth_requests.write().await;
        let Some(request) = auth_requests.get_mut(&id) else {
            return Ok(None);
        };
        if self.pending_expired(request, now) {
            return Ok(None);
        }
        if request.status == AuthRequestStatus::Pending {
            request.status = AuthRequestStatus::Denied;
        }
        Ok(Some(request.clone()))
    }

    async fn find_grant(&self, code: &str) -> Result<Option<AccessGrant>> {
        let now = Utc::now();
        Ok(self
            .grants
            .read()
            .await
            .get(&code.to_ascii_lowercase())
            .filter(|grant| grant.expires_at > now)
            .cloned())
    }

    async fn redeem_grant(&self, code: &str) -> Result<Option<AccessToken>> {
        let now = Utc::now();
        // removal under the write lock makes redemption one-shot: the
        // second of two concurrent callers finds nothing
        let grant = {
            let mut grants = self.grants.write().await;
            match grants.remove(&code.to_ascii_lowercase()) {
                Some(grant) if grant.expires_at > now => grant,
                _ => return Ok(None),
            }
        };

        let mut tokens = self.tokens.write().await;
        let token = Self::live_token_locked(
            &mut tokens,
            &grant.resource,
            &grant.client_id,
            &grant.scope,
            self.access_token_ttl,
            now,
        )?;
        Ok(Some(token))
    }

    async fn find_token(&self, token: &str) -> Result<Option<AccessToken>> {
        Ok(self
            .tokens
            .read()
            .await
            .get(&token.to_ascii_lowercase())
            .cloned())
    }

    async fn tokens_for_resource(&self, resource: &str) -> Result<Vec<AccessToken>> {
        Ok(self
            .tokens
            .read()
            .await
            .values()
            .filter(|t| t.resource == resource)
            .cloned()
            .collect())
    }

    async fn token_for(
        &self,
        resource: &str,
        client_id: &str,
        scope: &str,
    ) -> Result<AccessToken> {
        let mut tokens = self.tokens.write().await;
        Self::live_token_locked(
            &mut tokens,
            resource,
            client_id,
            scope,
            self.access_token_ttl,
            Utc::now(),
        )
    }

    async fn revoke_token(&self, token: &str) -> Result<()> {
        if let Some(token) = self
            .tokens
            .write()
            .await
            .get_mut(&token.to_ascii_lowercase())
        {
            token.revoked = true;
        }
        Ok(())
    }
}
