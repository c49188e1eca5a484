//! Authentication module for managing the user session.
//!
//! This module provides the public interface for authentication-related
//! functionality such as login, registration, logout, token persistence and
//! lazy session initialization from a stored token pair.

pub mod models;
pub mod service;
pub mod store;
