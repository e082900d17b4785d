//! Library surface for oemon (used by the binary and integration tests).

pub mod app;
pub mod client;
pub mod config;
pub mod history;
pub mod key;
pub mod poller;
pub mod profiles;
pub mod types;
pub mod ui;
