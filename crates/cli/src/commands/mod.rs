//! CLI Commands

pub mod bootstrap;
pub mod clients;
pub mod config;
pub mod hex;
