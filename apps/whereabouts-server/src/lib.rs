//! Group location sharing: who may see whose whereabouts, and who may manage whom.
//!
//! Handlers in [`handlers`] are plain async functions over a
//! [`server::WhereaboutsServer`] and a [`request::Request`] envelope. The
//! authorization rules live in [`policy`] and the per-viewer projection in
//! [`view`]; neither performs I/O.

pub mod config;
pub mod error;
pub mod handlers;
pub mod policy;
pub mod request;
pub mod server;
pub mod view;

#[cfg(test)]
mod tests;
