/*! DHT lookup traffic carried over a path.
*/

use cookie_factory::{do_gen, gen_be_u8, gen_slice};
use nom::IResult;
use nom::bytes::complete::tag;
use nom::combinator::rest;

use mantle_binary_io::*;

/** DHT lookup request or response relayed through a path. The payload is an
opaque dictionary-encoded record owned by the DHT layer; this core does not
interpret it.

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x04`
variable | Opaque payload

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DhtMessage {
    /// Opaque dictionary-encoded payload.
    pub payload: Vec<u8>,
}

impl FromBytes for DhtMessage {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag("\x04")(input)?;
        let (input, payload) = rest(input)?;
        Ok((input, DhtMessage { payload: payload.to_vec() }))
    }
}

impl ToBytes for DhtMessage {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_be_u8!(0x04) >>
            gen_slice!(self.payload.as_slice())
        )
    }
}
