//! Server unit and integration tests.
//!
//! Tests are organized into modules by feature area:
//! - `common` - Shared test helpers and utilities
//! - `users` - Sign-in, profile and API key rotation
//! - `locations` - Device location reports
//! - `groups` - Group CRUD and per-viewer projection
//! - `members` - Role changes, removal, leaving, sharing flags
//! - `invites` - Invite issuance, previews and joining
//! - `scenarios` - Multi-user end-to-end flows
//! - `store_errors` - Store failure mapping via a mocked store

pub mod common;

mod store_errors;
mod users;
