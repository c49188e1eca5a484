//! Client runtime for the Timekeeper workforce/job-tracking system.
//!
//! Provides the session/auth module, the preconfigured HTTP client with
//! token refresh, the route-guard logic and the two broker-fed state-sync
//! services (jobs and clients). The view layer consumes these; it is not
//! part of this crate.

pub mod auth;
pub mod config;
pub mod errors;
pub mod http;
pub mod routing;
pub mod sync;
pub mod utils;
