/*! Routing control messages carried inside a path's decrypted frame.

The message vocabulary is a closed set dispatched over a one-byte tag.
*/

mod dht_message;
mod path_confirm;
mod path_latency;
mod path_transfer;

pub use self::dht_message::*;
pub use self::path_confirm::*;
pub use self::path_latency::*;
pub use self::path_transfer::*;

use nom::IResult;
use nom::branch::alt;
use nom::combinator::map;

use mantle_binary_io::*;

/** The routing control message vocabulary.

Serialized form:

Tag    | Message
------ | ------
`0x01` | [`PathConfirm`]
`0x02` | [`PathLatency`]
`0x03` | [`PathTransfer`]
`0x04` | [`DhtMessage`]

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RoutingMessage {
    /// Confirms a path build to its owner.
    PathConfirm(PathConfirm),
    /// Latency probe or its echo.
    PathLatency(PathLatency),
    /// Transfer of traffic to another path. Not handled by this core.
    PathTransfer(PathTransfer),
    /// DHT lookup traffic carried over the path. Not handled by this core.
    DhtMessage(DhtMessage),
}

impl FromBytes for RoutingMessage {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        alt((
            map(PathConfirm::from_bytes, RoutingMessage::PathConfirm),
            map(PathLatency::from_bytes, RoutingMessage::PathLatency),
            map(PathTransfer::from_bytes, RoutingMessage::PathTransfer),
            map(DhtMessage::from_bytes, RoutingMessage::DhtMessage),
        ))(input)
    }
}

impl ToBytes for RoutingMessage {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        match *self {
            RoutingMessage::PathConfirm(ref p) => p.to_bytes(buf),
            RoutingMessage::PathLatency(ref p) => p.to_bytes(buf),
            RoutingMessage::PathTransfer(ref p) => p.to_bytes(buf),
            RoutingMessage::DhtMessage(ref p) => p.to_bytes(buf),
        }
    }
}
