//! Server-side components of `keyforge-server`.
//!
//! - [`config`] - CLI/environment configuration.
//! - [`service`] - HTTP handlers over the key pool.
//! - [`telemetry`] - Console logging and optional OpenTelemetry export.
//!
//! These are wired together in the server's `main.rs`.

pub mod config;
pub mod service;
pub mod telemetry;
