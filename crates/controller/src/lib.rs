//! Daemon wiring for the adaptation controller: configuration and HTTP API

pub mod api;
pub mod config;
