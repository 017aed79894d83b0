//! Pete's Pets web server library.
//!
//! Page and JSON routes over one set of pet operations, with the store,
//! avatar storage, payment processor and mailer injected through
//! [`state::AppState`] so the whole router can be exercised in tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
pub mod testing;
