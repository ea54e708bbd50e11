/*! IntroAck packet — the second flight of the link handshake.
*/

use cookie_factory::{do_gen, gen_slice};
use nom::IResult;
use nom::combinator::eof;
use rand::{CryptoRng, Rng};

use mantle_binary_io::*;
use mantle_crypto::*;

use crate::errors::FrameError;
use crate::handshake::frame_mac;

/** Sent by the responder after a verified `Intro`. Carries a freshly
generated session token encrypted under the flight's shared secret; the
initiator must echo this token in `SessionStart` to prove the exchange was
not spliced.

Serialized form:

Length | Content
------ | ------
`32`   | MAC over nonce and encrypted token, keyed by the shared secret
`32`   | Nonce
`32`   | Session token, encrypted under the shared secret

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IntroAck {
    /// Authenticator over the rest of the frame.
    pub mac: ShortHash,
    /// Fresh nonce for this flight.
    pub nonce: HandshakeNonce,
    /// Encrypted session token.
    pub encrypted_token: [u8; 32],
}

impl FromBytes for IntroAck {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, mac) = <[u8; 32]>::from_bytes(input)?;
        let (input, nonce) = <[u8; NONCE_SIZE]>::from_bytes(input)?;
        let (input, encrypted_token) = <[u8; 32]>::from_bytes(input)?;
        let (input, _) = eof(input)?;
        Ok((input, IntroAck { mac, nonce, encrypted_token }))
    }
}

impl ToBytes for IntroAck {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_slice!(self.mac) >>
            gen_slice!(self.nonce) >>
            gen_slice!(self.encrypted_token)
        )
    }
}

impl IntroAck {
    /// Create an `IntroAck` carrying `token`, addressed to the initiator
    /// whose `Intro` was just verified. DH roles are swapped relative to the
    /// first flight: the responder derives in the server role.
    pub fn new<R: Rng + CryptoRng>(
        rng: &mut R,
        local_sk: &SecretKey,
        remote_pk: &PublicKey,
        token: &SessionToken,
    ) -> IntroAck {
        let nonce = random_nonce(rng);
        let shared = dh_server(remote_pk, local_sk, &nonce);

        let mut encrypted_token = *token;
        stream_xor(&mut encrypted_token, &shared, &nonce);

        let mac = frame_mac(&nonce, &encrypted_token, &shared);
        IntroAck { mac, nonce, encrypted_token }
    }

    /// Verify an `IntroAck` on the initiator side and recover the session
    /// token.
    pub fn verify(&self, local_sk: &SecretKey, remote_pk: &PublicKey) -> Result<SessionToken, FrameError> {
        let shared = dh_client(remote_pk, local_sk, &self.nonce);
        let mac = frame_mac(&self.nonce, &self.encrypted_token, &shared);
        if !hash_eq(&mac, &self.mac) {
            return Err(FrameError::Authentication);
        }

        let mut token = self.encrypted_token;
        stream_xor(&mut token, &shared, &self.nonce);
        Ok(token)
    }
}
