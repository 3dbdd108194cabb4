//! Staff attendance tracking: check-in/check-out sessions, periodic location capture, and
//! per-staff Excel attendance reports backed by a document store.

pub mod admin;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod keepalive;
pub mod reporting;
pub mod store;
pub mod telemetry;
pub mod tracking;
