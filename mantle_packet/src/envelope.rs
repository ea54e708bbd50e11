/*! Encrypted envelope for discrete relay-control records.

Independent of the link session: each envelope is authenticated between two
identities directly, so relay-commit records can be produced for routers the
sender holds no session with.
*/

use cookie_factory::{do_gen, gen_slice};
use nom::IResult;
use nom::combinator::{rest, verify};
use rand::{CryptoRng, Rng};

use mantle_binary_io::*;
use mantle_crypto::*;

use crate::errors::FrameError;

/// Size of the envelope header. Buffers at or below this size carry no
/// payload and are rejected.
pub const ENVELOPE_OVERHEAD: usize = 32 + NONCE_SIZE + KEY_SIZE;

const NONCE_OFFSET: usize = 32;
const PK_OFFSET: usize = NONCE_OFFSET + NONCE_SIZE;

/** An authenticated-encrypted record exchanged between two identities.

Serialized form:

Length   | Content
-------- | ------
`32`     | Keyed hash over nonce, sender key and ciphertext
`32`     | Nonce
`32`     | Sender public key
variable | Ciphertext

Encryption and decryption operate in place over the owned buffer; a failed
decryption leaves every byte untouched.
*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EncryptedFrame {
    buf: Vec<u8>,
}

impl FromBytes for EncryptedFrame {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, buf) = verify(rest, |buf: &[u8]| buf.len() > ENVELOPE_OVERHEAD)(input)?;
        Ok((input, EncryptedFrame { buf: buf.to_vec() }))
    }
}

impl ToBytes for EncryptedFrame {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf, gen_slice!(self.buf.as_slice()))
    }
}

impl EncryptedFrame {
    /// Create an envelope around a plaintext payload, header zeroed until
    /// [`EncryptedFrame::encrypt_in_place`] fills it in.
    pub fn from_payload(payload: &[u8]) -> EncryptedFrame {
        let mut buf = vec![0; ENVELOPE_OVERHEAD + payload.len()];
        buf[ENVELOPE_OVERHEAD..].copy_from_slice(payload);
        EncryptedFrame { buf }
    }

    /// Total size in bytes, header included.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty. Always false for well-formed envelopes.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The whole buffer, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The payload region (ciphertext, or plaintext after a successful
    /// decryption).
    pub fn payload(&self) -> &[u8] {
        &self.buf[ENVELOPE_OVERHEAD..]
    }

    /// Sender public key from the header.
    pub fn sender_pk(&self) -> PublicKey {
        let mut pk = [0; KEY_SIZE];
        pk.copy_from_slice(&self.buf[PK_OFFSET..PK_OFFSET + KEY_SIZE]);
        PublicKey::from(pk)
    }

    fn header_nonce(&self) -> HandshakeNonce {
        let mut nonce = [0; NONCE_SIZE];
        nonce.copy_from_slice(&self.buf[NONCE_OFFSET..NONCE_OFFSET + NONCE_SIZE]);
        nonce
    }

    /** Encrypt the payload region in place for `remote_pk`: write the sender
    key, randomize the nonce, encrypt under the derived shared secret and
    seal the whole span with a keyed hash.
    */
    pub fn encrypt_in_place<R: Rng + CryptoRng>(
        &mut self,
        rng: &mut R,
        local_sk: &SecretKey,
        remote_pk: &PublicKey,
    ) -> Result<(), FrameError> {
        if self.buf.len() <= ENVELOPE_OVERHEAD {
            return Err(FrameError::IncompleteFrame { len: self.buf.len(), min: ENVELOPE_OVERHEAD + 1 });
        }

        let local_pk = PublicKey::from(local_sk);
        self.buf[PK_OFFSET..PK_OFFSET + KEY_SIZE].copy_from_slice(local_pk.as_bytes());

        let nonce = random_nonce(rng);
        self.buf[NONCE_OFFSET..NONCE_OFFSET + NONCE_SIZE].copy_from_slice(&nonce);

        let shared = dh_client(remote_pk, local_sk, &nonce);
        stream_xor(&mut self.buf[ENVELOPE_OVERHEAD..], &shared, &nonce);

        let hash = keyed_hash(&self.buf[NONCE_OFFSET..], &shared);
        self.buf[..NONCE_OFFSET].copy_from_slice(&hash);
        Ok(())
    }

    /** Verify the keyed hash and, only on a match, decrypt the payload
    region in place and return it. Any failure leaves the buffer bytes
    exactly as they were.
    */
    pub fn decrypt_in_place(&mut self, local_sk: &SecretKey) -> Result<&[u8], FrameError> {
        if self.buf.len() <= ENVELOPE_OVERHEAD {
            return Err(FrameError::IncompleteFrame { len: self.buf.len(), min: ENVELOPE_OVERHEAD + 1 });
        }

        let sender_pk = self.sender_pk();
        let nonce = self.header_nonce();
        let shared = dh_server(&sender_pk, local_sk, &nonce);

        let digest = keyed_hash(&self.buf[NONCE_OFFSET..], &shared);
        let mut stored = [0; 32];
        stored.copy_from_slice(&self.buf[..NONCE_OFFSET]);
        if !hash_eq(&digest, &stored) {
            return Err(FrameError::Authentication);
        }

        stream_xor(&mut self.buf[ENVELOPE_OVERHEAD..], &shared, &nonce);
        Ok(&self.buf[ENVELOPE_OVERHEAD..])
    }
}
