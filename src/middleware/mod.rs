// ABOUTME: HTTP middleware for the admission-control boundary
// ABOUTME: Re-exports the admission guard applied in front of credential endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! HTTP middleware

/// Admission guard: ban check, IP window, then per-identifier window
pub mod admission;

pub use admission::{admission_guard, AdmissionState};
