//! HTTP service handing out keys from a [`keyforge::KeyPool`].
//!
//! ## Structure
//!
//! - [`config`] - Concrete counter and pool types.
//! - [`error`] - Mapping of [`keyforge::Error`] to HTTP responses.
//! - [`handler`] - Service state, routes, and shutdown (`KeyService`).

pub mod config;
pub mod error;
pub mod handler;
