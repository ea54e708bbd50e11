/*! Errors of packet-level encryption and verification.
*/

use thiserror::Error;

/// Error that can happen when verifying or decrypting a frame. Every variant
/// is terminal for the exchange the frame belongs to; there is no retry.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum FrameError {
    /// The keyed hash over the frame does not match the carried one.
    #[error("message authentication failed")]
    Authentication,
    /// The buffer is too small to hold the fixed-size header fields.
    #[error("frame of {len} bytes is below the minimum of {min} bytes")]
    IncompleteFrame {
        /// Size of the rejected buffer.
        len: usize,
        /// Minimum acceptable size.
        min: usize,
    },
    /// The decrypted session token differs from the expected one, so no
    /// session key is derived.
    #[error("session token mismatch")]
    TokenMismatch,
}
