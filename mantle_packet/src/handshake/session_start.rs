/*! SessionStart packet — the third flight of the link handshake.
*/

use cookie_factory::{do_gen, gen_slice};
use nom::IResult;
use nom::combinator::eof;
use rand::{CryptoRng, Rng};

use mantle_binary_io::*;
use mantle_crypto::*;

use crate::errors::FrameError;
use crate::handshake::frame_mac;

/** Sent by the initiator to finish the exchange. Echoes the session token
from `IntroAck` under an ephemeral secret and binds the final session key to
that token: `K = DH(remote, local, ShortHash(token ‖ nonce))`. A responder
that decrypts a different token derives no key at all.

Serialized form:

Length | Content
------ | ------
`32`   | MAC over nonce and encrypted token, keyed by the ephemeral secret
`32`   | Nonce
`32`   | Session token, encrypted under the ephemeral secret

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionStart {
    /// Authenticator over the rest of the frame.
    pub mac: ShortHash,
    /// Fresh nonce for this flight.
    pub nonce: HandshakeNonce,
    /// Encrypted session token.
    pub encrypted_token: [u8; 32],
}

impl FromBytes for SessionStart {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, mac) = <[u8; 32]>::from_bytes(input)?;
        let (input, nonce) = <[u8; NONCE_SIZE]>::from_bytes(input)?;
        let (input, encrypted_token) = <[u8; 32]>::from_bytes(input)?;
        let (input, _) = eof(input)?;
        Ok((input, SessionStart { mac, nonce, encrypted_token }))
    }
}

impl ToBytes for SessionStart {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_slice!(self.mac) >>
            gen_slice!(self.nonce) >>
            gen_slice!(self.encrypted_token)
        )
    }
}

/// `T = ShortHash(token ‖ nonce)` — the nonce of the session key derivation.
fn confirm_nonce(token: &SessionToken, nonce: &HandshakeNonce) -> HandshakeNonce {
    let mut data = [0; 32 + NONCE_SIZE];
    data[..32].copy_from_slice(token);
    data[32..].copy_from_slice(nonce);
    short_hash(&data)
}

impl SessionStart {
    /// Create a `SessionStart` echoing `token` and derive the initiator's
    /// copy of the session key.
    pub fn new<R: Rng + CryptoRng>(
        rng: &mut R,
        local_sk: &SecretKey,
        remote_pk: &PublicKey,
        token: &SessionToken,
    ) -> (SessionStart, SessionKey) {
        let nonce = random_nonce(rng);
        let ephemeral = dh_client(remote_pk, local_sk, &nonce);
        let session_key = dh_client(remote_pk, local_sk, &confirm_nonce(token, &nonce));

        let mut encrypted_token = *token;
        stream_xor(&mut encrypted_token, &ephemeral, &nonce);

        let mac = frame_mac(&nonce, &encrypted_token, &ephemeral);
        (SessionStart { mac, nonce, encrypted_token }, session_key)
    }

    /** Verify a `SessionStart` on the responder side: check the MAC, decrypt
    the token, compare it full-length against the token issued in `IntroAck`
    and only then derive the session key.
    */
    pub fn verify(
        &self,
        local_sk: &SecretKey,
        remote_pk: &PublicKey,
        token: &SessionToken,
    ) -> Result<SessionKey, FrameError> {
        let ephemeral = dh_server(remote_pk, local_sk, &self.nonce);
        let mac = frame_mac(&self.nonce, &self.encrypted_token, &ephemeral);
        if !hash_eq(&mac, &self.mac) {
            return Err(FrameError::Authentication);
        }

        let mut received = self.encrypted_token;
        stream_xor(&mut received, &ephemeral, &self.nonce);
        if !hash_eq(&received, token) {
            return Err(FrameError::TokenMismatch);
        }

        Ok(dh_server(remote_pk, local_sk, &confirm_nonce(token, &self.nonce)))
    }
}
