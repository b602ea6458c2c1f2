//! HTTP request handlers.

pub mod activities;
pub mod amavasyas;
pub mod attendance;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod locations;
pub mod permissions;
pub mod role_activity_permissions;
pub mod roles;
pub mod users;
