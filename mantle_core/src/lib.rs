//! The stateful core of the mantle overlay router: asynchronous execution of
//! the link handshake, client-owned onion paths, relay-owned transit hops and
//! the registry that routes frames between them.
//!
//! The transport event loop, identity storage, path-builder policy and the
//! dictionary encoding of routing payloads are external collaborators; this
//! crate consumes them through narrow interfaces.

#![forbid(unsafe_code)]

#[macro_use]
extern crate log;

pub mod handshake;
pub mod path;
pub mod time;
pub mod utils;
