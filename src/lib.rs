//! Profileforge - legacy transcoding profile converter
//!
//! This library crate exposes the file-level plumbing around the conversion
//! engine for the binary and for integration testing.

pub mod batch;
pub mod config;
pub mod loader;
pub mod summary;
pub mod validate;
