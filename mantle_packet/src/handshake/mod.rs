/*! Frames of the 3-flight authenticated key exchange and the session
traffic codec.

Every handshake frame is 96 bytes:

Length | Content
------ | ------
`32`   | Keyed hash over the rest of the frame
`32`   | Nonce
`32`   | Flight-specific encrypted field

The MAC of a frame always covers the nonce and the encrypted field, keyed
by the secret the flight is authenticated under. Session traffic uses the
same mac-then-nonce layout with a variable-length body.
*/

mod intro;
mod intro_ack;
mod session_frame;
mod session_start;

pub use self::intro::*;
pub use self::intro_ack::*;
pub use self::session_frame::*;
pub use self::session_start::*;

use mantle_crypto::*;

/// Total size of `Intro`, `IntroAck` and `SessionStart` frames.
pub const HANDSHAKE_FRAME_SIZE: usize = 96;

/// Keyed hash over `nonce ‖ body` — the authenticated span of every frame.
pub(crate) fn frame_mac(nonce: &HandshakeNonce, body: &[u8], key: &[u8; KEY_SIZE]) -> ShortHash {
    let mut data = Vec::with_capacity(NONCE_SIZE + body.len());
    data.extend_from_slice(nonce);
    data.extend_from_slice(body);
    keyed_hash(&data, key)
}
