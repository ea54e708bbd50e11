/*! Relay link frames carrying onion-transformed path traffic between
neighbors.

The body of a relay frame is opaque to every hop: each traversal applies one
stream-cipher layer under the hop's shared secret and the frame's nonce, so
only a full chain application at an endpoint yields the plaintext.
*/

use cookie_factory::{do_gen, gen_be_u16, gen_be_u8, gen_call, gen_cond, gen_many_ref, gen_slice};
use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::combinator::{map, map_parser, rest};
use nom::multi::length_count;
use nom::number::complete::{be_u16, be_u8};

use mantle_binary_io::*;
use mantle_crypto::*;

use crate::envelope::EncryptedFrame;
use crate::path_id::PathId;

/// Maximum number of envelopes a single [`RelayCommit`] may carry — one per
/// hop of the longest allowed path.
pub const MAX_COMMIT_FRAMES: usize = 8;

/** Path traffic moving away from the path owner, toward the terminal hop.

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x11`
`16`     | Path id, as known to the receiving neighbor
`32`     | Nonce shared by every layer of this frame
variable | Onion-transformed body

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelayUpstream {
    /// Path id the receiving neighbor routes this frame by.
    pub path_id: PathId,
    /// Nonce for the per-hop transform.
    pub nonce: HandshakeNonce,
    /// Onion-transformed body.
    pub payload: Vec<u8>,
}

impl FromBytes for RelayUpstream {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag("\x11")(input)?;
        let (input, path_id) = PathId::from_bytes(input)?;
        let (input, nonce) = <[u8; NONCE_SIZE]>::from_bytes(input)?;
        let (input, payload) = rest(input)?;
        Ok((input, RelayUpstream { path_id, nonce, payload: payload.to_vec() }))
    }
}

impl ToBytes for RelayUpstream {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_be_u8!(0x11) >>
            gen_call!(|buf, path_id| PathId::to_bytes(path_id, buf), &self.path_id) >>
            gen_slice!(self.nonce) >>
            gen_slice!(self.payload.as_slice())
        )
    }
}

/** Path traffic moving toward the path owner.

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x12`
`16`     | Path id, as known to the receiving neighbor
`32`     | Nonce shared by every layer of this frame
variable | Onion-transformed body

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelayDownstream {
    /// Path id the receiving neighbor routes this frame by.
    pub path_id: PathId,
    /// Nonce for the per-hop transform.
    pub nonce: HandshakeNonce,
    /// Onion-transformed body.
    pub payload: Vec<u8>,
}

impl FromBytes for RelayDownstream {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag("\x12")(input)?;
        let (input, path_id) = PathId::from_bytes(input)?;
        let (input, nonce) = <[u8; NONCE_SIZE]>::from_bytes(input)?;
        let (input, payload) = rest(input)?;
        Ok((input, RelayDownstream { path_id, nonce, payload: payload.to_vec() }))
    }
}

impl ToBytes for RelayDownstream {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_be_u8!(0x12) >>
            gen_call!(|buf, path_id| PathId::to_bytes(path_id, buf), &self.path_id) >>
            gen_slice!(self.nonce) >>
            gen_slice!(self.payload.as_slice())
        )
    }
}

/** A batch of per-hop relay-commit envelopes forwarded to the next hop of a
path under construction. Each envelope is readable only by the hop it is
addressed to.

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x13`
`1`      | Number of envelopes
variable | For each envelope: its length in BigEndian `u16`, then its bytes

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelayCommit {
    /// One envelope per remaining hop.
    pub frames: Vec<EncryptedFrame>,
}

impl FromBytes for RelayCommit {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag("\x13")(input)?;
        let (input, frames) = length_count(
            be_u8,
            map_parser(nom::multi::length_data(be_u16), EncryptedFrame::from_bytes),
        )(input)?;
        Ok((input, RelayCommit { frames }))
    }
}

impl ToBytes for RelayCommit {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_cond!(self.frames.len() > MAX_COMMIT_FRAMES, |buf| gen_error(buf, 0)) >>
            gen_be_u8!(self.frames.len() as u8) >>
            gen_many_ref!(&self.frames, |buf, frame| gen_commit_frame(buf, frame))
        )
    }
}

fn gen_commit_frame<'a>(
    buf: (&'a mut [u8], usize),
    frame: &EncryptedFrame,
) -> Result<(&'a mut [u8], usize), GenError> {
    do_gen!(buf,
        gen_cond!(frame.len() > u16::MAX as usize, |buf| gen_error(buf, 0)) >>
        gen_be_u16!(frame.len() as u16) >>
        gen_slice!(frame.as_bytes())
    )
}

/// Any message exchanged over an authenticated link on behalf of paths.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LinkPacket {
    /// Path traffic toward the terminal hop.
    RelayUpstream(RelayUpstream),
    /// Path traffic toward the path owner.
    RelayDownstream(RelayDownstream),
    /// Relay-commit envelopes for a path under construction.
    RelayCommit(RelayCommit),
}

impl FromBytes for LinkPacket {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        alt((
            map(RelayUpstream::from_bytes, LinkPacket::RelayUpstream),
            map(RelayDownstream::from_bytes, LinkPacket::RelayDownstream),
            map(RelayCommit::from_bytes, LinkPacket::RelayCommit),
        ))(input)
    }
}

impl ToBytes for LinkPacket {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        match *self {
            LinkPacket::RelayUpstream(ref p) => p.to_bytes(buf),
            LinkPacket::RelayDownstream(ref p) => p.to_bytes(buf),
            LinkPacket::RelayCommit(ref p) => p.to_bytes(buf),
        }
    }
}
