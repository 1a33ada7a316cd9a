//! Fetch named URLs, add them to a content-addressable store, and report the
//! resulting identifiers over HTTP or a WebSocket stream.

pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod utils;
pub mod worker;

#[cfg(test)]
mod testing;
