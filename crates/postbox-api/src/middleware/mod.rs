//! HTTP middleware for scheduler authentication and authorization.

pub mod auth;
