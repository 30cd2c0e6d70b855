// ABOUTME: Main library entry point for the Pierre authentication service
// ABOUTME: Credential lifecycle engines, admission control, and their HTTP boundary
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![deny(unsafe_code)]

//! # Pierre Auth Service
//!
//! A standalone authentication service issuing and validating credentials for
//! a larger application while protecting its own issuance endpoints from
//! abuse.
//!
//! ## Architecture
//!
//! - **Key lifecycle** ([`jwks`]): RSA signing key pairs with scheduled
//!   rotation; every historical key stays available for verification and is
//!   published through the JWKS document.
//! - **Bearer tokens** ([`auth`]): RS256 JWTs verified strictly by header
//!   `kid`; revocation rides on companion ACCESS entries in the token store.
//! - **Opaque tokens** ([`tokens`]): single-purpose random secrets stored
//!   digest-only, with at-most-once consumption, refresh rotation, and bulk
//!   revocation.
//! - **Admission control** ([`admission`], [`middleware`]): a persisted ban
//!   list plus fixed-window rate limiting applied before any credential
//!   logic runs.
//! - **TOTP** ([`totp`]): stateless multi-factor code generation and
//!   verification.
//!
//! Background rotation and the token retention sweep run as independent
//! timer tasks ([`lifecycle`]), isolated from request handling.

/// Bearer token issuance and verification
pub mod auth;

/// Application constants and default configuration values
pub mod constants;

/// Configuration management
pub mod config;

/// Digest and entropy utilities
pub mod crypto;

/// Database management for token and ban persistence
pub mod database;

/// Admission control: rate limiting and the ban list
pub mod admission;

/// Unified error taxonomy
pub mod errors;

/// Signing-key lifecycle and JWKS publication
pub mod jwks;

/// Background lifecycle tasks
pub mod lifecycle;

/// Logging configuration
pub mod logging;

/// HTTP middleware
pub mod middleware;

/// Core data models
pub mod models;

/// Outbound notification seam
pub mod notify;

/// Read-only HTTP routes
pub mod routes;

/// Opaque token store
pub mod tokens;

/// TOTP multi-factor engine
pub mod totp;
