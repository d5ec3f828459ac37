// ABOUTME: HTTP middleware: bearer-token guards for the management surface
// ABOUTME: Token comparison is constant-time to avoid timing side channels
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! HTTP middleware

pub mod auth;
