//! Shared test support

pub mod backend_config;
