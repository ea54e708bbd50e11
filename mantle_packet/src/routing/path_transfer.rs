/*! PathTransfer message.
*/

use cookie_factory::{do_gen, gen_be_u8, gen_call, gen_slice};
use nom::IResult;
use nom::bytes::complete::tag;
use nom::combinator::rest;

use mantle_binary_io::*;

use crate::path_id::PathId;

/** Asks the terminal hop to hand the payload to another path it knows.
Owned by the hidden-service layer; this core recognizes the tag only to
reject the message explicitly.

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x03`
`16`     | Destination path id
variable | Payload

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathTransfer {
    /// The path to hand the payload to.
    pub path_id: PathId,
    /// Opaque payload.
    pub payload: Vec<u8>,
}

impl FromBytes for PathTransfer {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag("\x03")(input)?;
        let (input, path_id) = PathId::from_bytes(input)?;
        let (input, payload) = rest(input)?;
        Ok((input, PathTransfer { path_id, payload: payload.to_vec() }))
    }
}

impl ToBytes for PathTransfer {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_be_u8!(0x03) >>
            gen_call!(|buf, path_id| PathId::to_bytes(path_id, buf), &self.path_id) >>
            gen_slice!(self.payload.as_slice())
        )
    }
}
