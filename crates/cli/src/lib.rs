//! LwM2M Console CLI
//!
//! Command-line interface for inspecting and editing bootstrap
//! configurations and registered clients through the LwM2M demo REST APIs.

pub mod client;
pub mod commands;
pub mod config;
pub mod output;
