//! Hippo - DASH and Smooth Streaming segment server
//!
//! This library crate exposes the server for integration testing.

pub mod config;
pub mod manifest;
pub mod server;
pub mod streaming;
