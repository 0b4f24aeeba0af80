// ABOUTME: Storage abstraction for clients, authorization requests, grants, and tokens
// ABOUTME: One trait covers every entity; backends supply atomicity for the lifecycle transitions
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Storage layer
//!
//! The middleware owns no persistent state; everything durable goes through
//! [`OAuth2Store`]. Backends must make the three lifecycle operations
//! atomic: the pending-conditional authorization transition, the one-shot
//! code redemption, and the `(resource, client, scope)` token uniqueness.
//! [`memory::MemoryStore`] is the bundled backend for tests and demos.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{AccessGrant, AccessToken, AuthRequest, Client, NewAuthRequest};

pub mod memory;

pub use memory::MemoryStore;

/// Durable storage contract for the OAuth 2.0 provider
///
/// All methods return `anyhow::Result`; the protocol components translate
/// backend failures into wire errors (or a bare challenge) themselves.
#[async_trait]
pub trait OAuth2Store: Send + Sync {
    // ================================
    // Clients
    // ================================

    /// Look up a registered client. Malformed identifiers are simply not
    /// found; the caller collapses every miss into `invalid_client`.
    async fn find_client(&self, client_id: &str) -> Result<Option<Client>>;

    /// Revoke a client registration; revoked clients no longer authorize
    /// or obtain tokens
    async fn revoke_client(&self, client_id: &str) -> Result<()>;

    // ================================
    // Authorization requests
    // ================================

    /// Persist a new pending authorization request
    async fn create_auth_request(&self, new: NewAuthRequest) -> Result<AuthRequest>;

    /// Load an authorization request; pending records past the backend's
    /// TTL behave as unknown
    async fn find_auth_request(&self, id: Uuid) -> Result<Option<AuthRequest>>;

    /// Transition a pending request to `granted`, minting the authorization
    /// code or access token its `response_type` calls for.
    ///
    /// The transition is conditional on `pending`: a record already terminal
    /// is returned unchanged and nothing new is issued, so repeated
    /// finalizations stay idempotent. Unknown or expired ids yield `None`.
    async fn grant_auth_request(&self, id: Uuid, resource: &str)
        -> Result<Option<AuthRequest>>;

    /// Transition a pending request to `denied` (same conditional-on-pending
    /// contract as [`grant_auth_request`](Self::grant_auth_request))
    async fn deny_auth_request(&self, id: Uuid) -> Result<Option<AuthRequest>>;

    // ================================
    // Access grants
    // ================================

    /// Look up an authorization code (case-insensitive); expired codes
    /// behave as unknown
    async fn find_grant(&self, code: &str) -> Result<Option<AccessGrant>>;

    /// Redeem an authorization code for an access token, exactly once.
    ///
    /// The first caller wins; concurrent or repeated redemptions of the
    /// same code yield `None`.
    async fn redeem_grant(&self, code: &str) -> Result<Option<AccessToken>>;

    // ================================
    // Access tokens
    // ================================

    /// Look up a bearer token (case-insensitive). Returns revoked and
    /// expired records as stored; validity is judged by the caller.
    async fn find_token(&self, token: &str) -> Result<Option<AccessToken>>;

    /// All tokens issued on behalf of one resource
    async fn tokens_for_resource(&self, resource: &str) -> Result<Vec<AccessToken>>;

    /// Obtain the unique live token for `(resource, client, scope)`,
    /// minting one only when no live match exists
    async fn token_for(&self, resource: &str, client_id: &str, scope: &str)
        -> Result<AccessToken>;

    /// Revoke an access token
    async fn revoke_token(&self, token: &str) -> Result<()>;
}
