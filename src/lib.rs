//! unbale - archive fetch/extract/relay service
//!
//! Fetches a remote archive over HTTP, classifies it by file-name suffix,
//! streams its member files out of the container in memory, and hands each
//! one to an upload sink as a detached task. Nothing is staged on disk.

pub mod archive;
pub mod config;
pub mod fetch;
pub mod pipeline;
pub mod server;
pub mod sink;
