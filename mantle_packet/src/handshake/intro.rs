/*! Intro packet — the first flight of the link handshake.
*/

use cookie_factory::{do_gen, gen_slice};
use nom::IResult;
use nom::combinator::eof;
use rand::{CryptoRng, Rng};

use mantle_binary_io::*;
use mantle_crypto::*;

use crate::errors::FrameError;
use crate::handshake::frame_mac;

/** Sent by the initiator to open an exchange. Carries the initiator's
long-term public key, obfuscated so a passive observer cannot harvest
identities from the wire.

Serialized form:

Length | Content
------ | ------
`32`   | MAC over nonce and obfuscated key, keyed by the shared secret
`32`   | Nonce
`32`   | Initiator public key, obfuscated under a recipient-derived key

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Intro {
    /// Authenticator over the rest of the frame.
    pub mac: ShortHash,
    /// Fresh nonce for this flight.
    pub nonce: HandshakeNonce,
    /// Obfuscated initiator public key.
    pub encrypted_pk: [u8; KEY_SIZE],
}

impl FromBytes for Intro {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, mac) = <[u8; 32]>::from_bytes(input)?;
        let (input, nonce) = <[u8; NONCE_SIZE]>::from_bytes(input)?;
        let (input, encrypted_pk) = <[u8; KEY_SIZE]>::from_bytes(input)?;
        let (input, _) = eof(input)?;
        Ok((input, Intro { mac, nonce, encrypted_pk }))
    }
}

impl ToBytes for Intro {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_slice!(self.mac) >>
            gen_slice!(self.nonce) >>
            gen_slice!(self.encrypted_pk)
        )
    }
}

/// Obfuscation key for the embedded public key: `ShortHash(responder_pk ‖ nonce)`.
fn obfuscation_key(responder_pk: &PublicKey, nonce: &HandshakeNonce) -> ShortHash {
    let mut data = [0; KEY_SIZE + NONCE_SIZE];
    data[..KEY_SIZE].copy_from_slice(responder_pk.as_bytes());
    data[KEY_SIZE..].copy_from_slice(nonce);
    short_hash(&data)
}

impl Intro {
    /// Create an `Intro` addressed to `remote_pk`, authenticated under the
    /// secret both sides can derive from this flight's nonce.
    pub fn new<R: Rng + CryptoRng>(rng: &mut R, local_sk: &SecretKey, remote_pk: &PublicKey) -> Intro {
        let nonce = random_nonce(rng);
        let shared = dh_client(remote_pk, local_sk, &nonce);

        let mut encrypted_pk = *PublicKey::from(local_sk).as_bytes();
        stream_xor(&mut encrypted_pk, &obfuscation_key(remote_pk, &nonce), &nonce);

        let mac = frame_mac(&nonce, &encrypted_pk, &shared);
        Intro { mac, nonce, encrypted_pk }
    }

    /** Verify an incoming `Intro` and recover the initiator's public key.

    Returns `FrameError::Authentication` when the MAC does not match; the
    exchange is terminal at that point and nothing is recovered.
    */
    pub fn verify(&self, local_sk: &SecretKey) -> Result<PublicKey, FrameError> {
        let local_pk = PublicKey::from(local_sk);

        let mut sender_pk = self.encrypted_pk;
        stream_xor(&mut sender_pk, &obfuscation_key(&local_pk, &self.nonce), &self.nonce);
        let sender_pk = PublicKey::from(sender_pk);

        let shared = dh_server(&sender_pk, local_sk, &self.nonce);
        let mac = frame_mac(&self.nonce, &self.encrypted_pk, &shared);
        if !hash_eq(&mac, &self.mac) {
            return Err(FrameError::Authentication);
        }
        Ok(sender_pk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    encode_decode_test!(
        intro_encode_decode,
        Intro {
            mac: [42; 32],
            nonce: [43; NONCE_SIZE],
            encrypted_pk: [44; KEY_SIZE],
        }
    );

    #[test]
    fn intro_verify_recovers_sender() {
        let mut rng = thread_rng();
        let (alice_sk, alice_pk) = gen_keypair(&mut rng);
        let (bob_sk, bob_pk) = gen_keypair(&mut rng);

        let intro = Intro::new(&mut rng, &alice_sk, &bob_pk);
        assert_eq!(intro.verify(&bob_sk).unwrap(), alice_pk);
    }

    #[test]
    fn intro_verify_rejects_altered_nonce() {
        let mut rng = thread_rng();
        let (alice_sk, _) = gen_keypair(&mut rng);
        let (bob_sk, bob_pk) = gen_keypair(&mut rng);

        let mut intro = Intro::new(&mut rng, &alice_sk, &bob_pk);
        intro.nonce[0] ^= 1;
        assert_eq!(intro.verify(&bob_sk), Err(FrameError::Authentication));
    }

    #[test]
    fn intro_verify_rejects_altered_mac() {
        let mut rng = thread_rng();
        let (alice_sk, _) = gen_keypair(&mut rng);
        let (bob_sk, bob_pk) = gen_keypair(&mut rng);

        let mut intro = Intro::new(&mut rng, &alice_sk, &bob_pk);
        intro.mac[31] ^= 1;
        assert_eq!(intro.verify(&bob_sk), Err(FrameError::Authentication));
    }

    #[test]
    fn intro_verify_rejects_altered_key_field() {
        let mut rng = thread_rng();
        let (alice_sk, _) = gen_keypair(&mut rng);
        let (bob_sk, bob_pk) = gen_keypair(&mut rng);

        let mut intro = Intro::new(&mut rng, &alice_sk, &bob_pk);
        intro.encrypted_pk[7] ^= 1;
        assert_eq!(intro.verify(&bob_sk), Err(FrameError::Authentication));
    }

    #[test]
    fn intro_verify_rejects_wrong_recipient() {
        let mut rng = thread_rng();
        let (alice_sk, _) = gen_keypair(&mut rng);
        let (_, bob_pk) = gen_keypair(&mut rng);
        let (eve_sk, _) = gen_keypair(&mut rng);

        let intro = Intro::new(&mut rng, &alice_sk, &bob_pk);
        assert_eq!(intro.verify(&eve_sk), Err(FrameError::Authentication));
    }
}
