//! Byte-exact wire formats of the mantle overlay router: handshake frames,
//! session traffic frames, encrypted envelopes for relay-control records,
//! relay link frames and the routing control messages carried inside paths.
//!
//! Parsing uses nom, serialization uses cookie-factory. Packet-level
//! cryptography lives as methods on the packet types; the stateful protocol
//! machinery is in `mantle_core`.

#![forbid(unsafe_code)]

pub mod commit;
pub mod envelope;
pub mod errors;
pub mod handshake;
pub mod path_id;
pub mod relay;
pub mod routing;
