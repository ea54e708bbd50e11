/*! PathLatency message.
*/

use cookie_factory::{do_gen, gen_be_u64, gen_be_u8};
use nom::IResult;
use nom::bytes::complete::tag;
use nom::combinator::eof;
use nom::number::complete::be_u64;

use mantle_binary_io::*;

/** Latency probe sent by a path owner right after the path is confirmed,
echoed back unchanged by the terminal hop. The correlation token ties an
echo to the probe it answers; stale echoes carry a token nobody is waiting
for and are dropped.

Serialized form:

Length | Content
------ | ------
`1`    | `0x02`
`8`    | Correlation token in BigEndian, never zero

*/
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PathLatency {
    /// Correlation token.
    pub token: u64,
}

impl FromBytes for PathLatency {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag("\x02")(input)?;
        let (input, token) = be_u64(input)?;
        let (input, _) = eof(input)?;
        Ok((input, PathLatency { token }))
    }
}

impl ToBytes for PathLatency {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_be_u8!(0x02) >>
            gen_be_u64!(self.token)
        )
    }
}
