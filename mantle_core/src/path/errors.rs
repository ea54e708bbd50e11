//! Errors of path traffic handling.

use thiserror::Error;

/// Error that can occur while a path handles traffic.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum PathError {
    /// A decrypted frame did not parse as a routing message.
    #[error("Downstream frame does not carry a routing message")]
    InvalidMessage,
    /// A routing message did not fit the outbound frame buffer.
    #[error("Routing message too large to serialize")]
    Serialize,
    /// The transport sink is gone.
    #[error("Transport sink rejected the frame")]
    SendTo,
    /// PathConfirm received while the path is not building.
    #[error("PathConfirm on a path that is not building")]
    UnexpectedConfirm,
    /// PathTransfer is owned by an external collaborator.
    #[error("PathTransfer is not handled by this core")]
    UnexpectedTransfer,
    /// DHT traffic is owned by an external collaborator.
    #[error("DHT messages are not handled by this core")]
    DhtUnhandled,
    /// Hidden-service traffic is owned by an external collaborator.
    #[error("Hidden service data is not handled by this core")]
    HiddenServiceUnhandled,
}
