/*! PathConfirm message.
*/

use cookie_factory::{do_gen, gen_be_u8};
use nom::IResult;
use nom::bytes::complete::tag;
use nom::combinator::eof;

use mantle_binary_io::*;

/** Sent back along a freshly built path by its terminal hop. Valid only
while the path is still building; its receipt flips the path to established.

Serialized form:

Length | Content
------ | ------
`1`    | `0x01`

*/
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PathConfirm;

impl FromBytes for PathConfirm {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag("\x01")(input)?;
        let (input, _) = eof(input)?;
        Ok((input, PathConfirm))
    }
}

impl ToBytes for PathConfirm {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf, gen_be_u8!(0x01))
    }
}
