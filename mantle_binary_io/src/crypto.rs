use std::convert::TryInto;

use nom::IResult;
use nom::bytes::streaming::take;
use nom::combinator::{map, map_opt};

use x25519_dalek::{PublicKey, StaticSecret};

use super::FromBytes;

/// Number of bytes in an x25519 key.
const KEY_SIZE: usize = 32;

impl FromBytes for PublicKey {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        map(map_opt(take(KEY_SIZE), |pk: &[u8]| pk.try_into().ok()), |pk: [u8; KEY_SIZE]| pk.into())(input)
    }
}

impl FromBytes for StaticSecret {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        map(map_opt(take(KEY_SIZE), |sk: &[u8]| sk.try_into().ok()), |sk: [u8; KEY_SIZE]| sk.into())(input)
    }
}
