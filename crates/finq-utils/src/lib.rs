//! Shared utilities for finq-rs
//!
//! This crate provides common functionality used across the finq-rs workspace,
//! including logging setup and environment-driven configuration helpers.

pub mod config;
pub mod logging;

pub use config::{ConfigError, Environment, env_duration_secs, env_parse, env_var};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
