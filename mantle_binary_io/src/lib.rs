//! Traits for binary serialization of the mantle wire formats.

#![forbid(unsafe_code)]

#[cfg(feature = "crypto")]
mod crypto;

pub use cookie_factory::GenError;
pub use nom::IResult;

use nom::bytes::streaming::take;
use nom::combinator::map_opt;

/// The trait for de-serializing a value from bytes.
pub trait FromBytes: Sized {
    /// Parse a value from the beginning of `input`, returning the unconsumed
    /// rest of the input alongside it.
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self>;
}

/// The trait for serializing a value into a caller-supplied buffer.
pub trait ToBytes {
    /// Write the serialized form into `buf` starting at the given offset and
    /// return the buffer with the advanced offset.
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError>;
}

// Fixed-size value fields used by the wire formats.

impl FromBytes for [u8; 16] {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        map_opt(take(16usize), |bytes: &[u8]| bytes.try_into().ok())(input)
    }
}

impl FromBytes for [u8; 32] {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        map_opt(take(32usize), |bytes: &[u8]| bytes.try_into().ok())(input)
    }
}

/// Abort serialization with a custom error code. Meant for `gen_cond!`
/// guards on values that cannot be represented on the wire.
pub fn gen_error(_buf: (&mut [u8], usize), code: u32) -> Result<(&mut [u8], usize), GenError> {
    Err(GenError::CustomError(code))
}

/// Test that a value round trips through `ToBytes` and `FromBytes` unchanged.
#[macro_export]
macro_rules! encode_decode_test (
    ($test:ident, $value:expr) => (
        #[test]
        fn $test() {
            fn from_bytes_of<'a, T: $crate::FromBytes>(
                _hint: &T,
                input: &'a [u8],
            ) -> $crate::IResult<&'a [u8], T> {
                T::from_bytes(input)
            }
            let value = $value;
            let mut buf = [0; 1024 * 4];
            let (_, size) = value.to_bytes((&mut buf, 0)).unwrap();
            let (rest, decoded) = from_bytes_of(&value, &buf[..size]).unwrap();
            assert!(rest.is_empty());
            assert_eq!(decoded, value);
        }
    )
);
