/*! Session traffic frame for an established link.
*/

use cookie_factory::{do_gen, gen_slice};
use nom::IResult;
use nom::combinator::rest;
use rand::{CryptoRng, Rng};

use mantle_binary_io::*;
use mantle_crypto::*;

use crate::errors::FrameError;
use crate::handshake::frame_mac;

/// Size of the MAC and nonce header of a [`SessionFrame`].
pub const SESSION_FRAME_OVERHEAD: usize = 64;

/** A single datagram of session traffic, encrypted under the session key
agreed by the handshake. Encrypt-then-authenticate: the receive side checks
the MAC over `nonce ‖ ciphertext` before any decryption happens.

Serialized form:

Length   | Content
-------- | ------
`32`     | MAC over nonce and ciphertext, keyed by the session key
`32`     | Nonce
variable | Ciphertext

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionFrame {
    /// Authenticator over the rest of the frame.
    pub mac: ShortHash,
    /// Fresh nonce, randomized per frame.
    pub nonce: HandshakeNonce,
    /// Encrypted body.
    pub payload: Vec<u8>,
}

impl FromBytes for SessionFrame {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, mac) = <[u8; 32]>::from_bytes(input)?;
        let (input, nonce) = <[u8; NONCE_SIZE]>::from_bytes(input)?;
        let (input, payload) = rest(input)?;
        Ok((input, SessionFrame { mac, nonce, payload: payload.to_vec() }))
    }
}

impl ToBytes for SessionFrame {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_slice!(self.mac) >>
            gen_slice!(self.nonce) >>
            gen_slice!(self.payload.as_slice())
        )
    }
}

impl SessionFrame {
    /// Encrypt `plaintext` into a frame under `session_key` with a fresh
    /// random nonce.
    pub fn encrypt<R: Rng + CryptoRng>(rng: &mut R, session_key: &SessionKey, plaintext: &[u8]) -> SessionFrame {
        let nonce = random_nonce(rng);
        let mut payload = plaintext.to_vec();
        stream_xor(&mut payload, session_key, &nonce);
        let mac = frame_mac(&nonce, &payload, session_key);
        SessionFrame { mac, nonce, payload }
    }

    /// Check the MAC and, only on a match, decrypt and return the body.
    pub fn decrypt(&self, session_key: &SessionKey) -> Result<Vec<u8>, FrameError> {
        let mac = frame_mac(&self.nonce, &self.payload, session_key);
        if !hash_eq(&mac, &self.mac) {
            return Err(FrameError::Authentication);
        }

        let mut plaintext = self.payload.clone();
        stream_xor(&mut plaintext, session_key, &self.nonce);
        Ok(plaintext)
    }
}
