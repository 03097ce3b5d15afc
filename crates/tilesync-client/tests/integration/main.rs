//! Integration test entry point for tilesync-client.
//!
//! Each test starts its own in-process server on an ephemeral port.

mod harness;
mod http;
mod sync;
