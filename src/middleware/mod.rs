//! HTTP middleware: authentication, authorization, request ids, rate limits.

pub mod abac;
pub mod auth;
pub mod metrics;
pub mod rate_limit;
pub mod request_id;
