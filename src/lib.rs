// ABOUTME: Library entry point for the OAuth 2.0 authorization-server middleware
// ABOUTME: Re-exports the provider, configuration, store contract, and protocol types
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![deny(unsafe_code)]

//! # OAuth 2.0 Provider Middleware
//!
//! An OAuth 2.0 authorization server (draft-ietf-oauth-v2-10) packaged as
//! axum middleware. The middleware intercepts two well-known endpoints on a
//! host application, drives the end-user consent flow, issues authorization
//! codes and bearer access tokens, and guards every other path by
//! verifying bearer credentials.
//!
//! ## Request roles
//!
//! | Role | Trigger | Component |
//! |---|---|---|
//! | Authorization request | configured authorize path | authorizer |
//! | Token request | configured token path | token issuer |
//! | Consent response | host response carrying the authorization sentinel | authorizer (finalization) |
//! | Resource request | anything else | resource gate |
//!
//! ## Working with the host application
//!
//! The middleware talks to the host app through typed request extensions
//! ([`middleware::PendingAuthorization`], [`middleware::ConsentView`],
//! [`middleware::Authenticated`]) on the way in, and through the
//! `oauth.authorization` / `oauth.no_access` / `oauth.no_scope` response
//! headers on the way out. See the [`middleware`] module for the wiring
//! example and the sentinel semantics.
//!
//! ## Storage
//!
//! Durable state (clients, authorization requests, codes, tokens) lives
//! behind the [`store::OAuth2Store`] trait; [`store::MemoryStore`] is the
//! bundled backend for tests, demos, and single-process deployments.

/// Authorize endpoint: pre-consent validation and consent finalization
pub mod authorizer;

/// Client lookup and authentication
pub mod clients;

/// Middleware configuration and the resource-owner authenticator seam
pub mod config;

/// Credential and parameter extraction from HTTP requests
pub mod decoder;

/// Protocol error taxonomy and `WWW-Authenticate` challenge assembly
pub mod errors;

/// Structured logging setup for host processes
pub mod logging;

/// Dispatcher middleware, provider state, and the host-app contract
pub mod middleware;

/// Core OAuth 2.0 entities and scope handling
pub mod models;

/// Redirect URI validation and callback URI assembly
pub mod redirect;

/// Resource gate for non-protocol paths
pub mod resource;

/// Storage contract and the in-memory backend
pub mod store;

/// Token endpoint grants
pub mod token;

pub use config::{OAuth2Config, ResourceAuthenticator};
pub use errors::{Challenge, ProtocolError, ProtocolResult};
pub use middleware::{
    oauth2_middleware, Authenticated, ConsentView, OAuth2Provider, PendingAuthorization,
};
pub use models::{AccessGrant, AccessToken, AuthRequest, AuthRequestStatus, Client, ResponseType};
pub use store::{MemoryStore, OAuth2Store};
