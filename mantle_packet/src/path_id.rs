/*! Path identifier value type.
*/

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use cookie_factory::{do_gen, gen_slice};
use nom::IResult;
use rand::{CryptoRng, Rng};

use mantle_binary_io::*;

/// Number of bytes in a [`PathId`].
pub const PATH_ID_SIZE: usize = 16;

/// Identifier for one direction of one path hop. Identifiers are random and
/// not required to be globally unique; registry lookups disambiguate by
/// neighbor identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct PathId([u8; PATH_ID_SIZE]);

impl PathId {
    /// Generate a fresh random identifier.
    pub fn random<R: Rng + CryptoRng>(rng: &mut R) -> PathId {
        let mut bytes = [0; PATH_ID_SIZE];
        rng.fill_bytes(&mut bytes);
        PathId(bytes)
    }

    /// The raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; PATH_ID_SIZE] {
        &self.0
    }
}

impl From<[u8; PATH_ID_SIZE]> for PathId {
    fn from(bytes: [u8; PATH_ID_SIZE]) -> PathId {
        PathId(bytes)
    }
}

// Equality scans the full length instead of short-circuiting on the first
// differing byte.
impl PartialEq for PathId {
    fn eq(&self, other: &PathId) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl Eq for PathId {}

impl PartialOrd for PathId {
    fn partial_cmp(&self, other: &PathId) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PathId {
    fn cmp(&self, other: &PathId) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Hash for PathId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&self.0);
    }
}

impl FromBytes for PathId {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, bytes) = <[u8; PATH_ID_SIZE]>::from_bytes(input)?;
        Ok((input, PathId(bytes)))
    }
}

impl ToBytes for PathId {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf, gen_slice!(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    encode_decode_test!(path_id_encode_decode, PathId::random(&mut thread_rng()));

    #[test]
    fn path_id_equality_is_bytewise() {
        let id = PathId::from([42; PATH_ID_SIZE]);
        let same = PathId::from([42; PATH_ID_SIZE]);
        let mut other_bytes = [42; PATH_ID_SIZE];
        other_bytes[PATH_ID_SIZE - 1] = 43;
        let other = PathId::from(other_bytes);

        assert_eq!(id, same);
        assert_ne!(id, other);
    }

    #[test]
    fn path_id_ordering_is_lexicographic() {
        let low = PathId::from([0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        let high = PathId::from([0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0]);
        assert!(low < high);
    }

    #[test]
    fn path_id_random_differs() {
        let mut rng = thread_rng();
        assert_ne!(PathId::random(&mut rng), PathId::random(&mut rng));
    }
}
