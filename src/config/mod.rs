// ABOUTME: Configuration module for environment-driven runtime settings
// ABOUTME: Re-exports the environment configuration types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Configuration management

/// Environment-based configuration parsing
pub mod environment;

pub use environment::{
    AdmissionConfig, AuthConfig, CleanupConfig, ServerConfig, TokenTtlConfig,
};
