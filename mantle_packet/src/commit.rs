/*! The plaintext relay-commit record a hop recovers from its envelope in a
[`RelayCommit`](crate::relay::RelayCommit) batch.

The record names everything the hop needs to relay the path except its
downstream neighbor, which is whoever delivered the batch.
*/

use cookie_factory::{do_gen, gen_be_u64, gen_call, gen_slice};
use nom::IResult;
use nom::combinator::eof;
use nom::number::complete::be_u64;

use mantle_binary_io::*;
use mantle_crypto::*;

use crate::path_id::PathId;

/** One hop's share of a path build.

Serialized form:

Length | Content
------ | ------
`32`   | Public key of the next hop on the upstream side
`16`   | Path id for frames leaving toward the upstream side
`16`   | Path id for frames arriving from the downstream side
`8`    | Hop lifetime in seconds, BigEndian

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommitRecord {
    /// Next router on the upstream side.
    pub upstream: PublicKey,
    /// Id this hop re-tags upstream frames with.
    pub tx_id: PathId,
    /// Id this hop receives upstream frames by.
    pub rx_id: PathId,
    /// How long the hop is asked to keep the path, in seconds.
    pub lifetime_secs: u64,
}

impl FromBytes for CommitRecord {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, upstream) = PublicKey::from_bytes(input)?;
        let (input, tx_id) = PathId::from_bytes(input)?;
        let (input, rx_id) = PathId::from_bytes(input)?;
        let (input, lifetime_secs) = be_u64(input)?;
        let (input, _) = eof(input)?;
        Ok((input, CommitRecord { upstream, tx_id, rx_id, lifetime_secs }))
    }
}

impl ToBytes for CommitRecord {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_slice!(self.upstream.as_bytes()) >>
            gen_call!(|buf, id| PathId::to_bytes(id, buf), &self.tx_id) >>
            gen_call!(|buf, id| PathId::to_bytes(id, buf), &self.rx_id) >>
            gen_be_u64!(self.lifetime_secs)
        )
    }
}
