//! Primitive cryptographic capabilities consumed by the mantle core:
//! Diffie-Hellman in client/server roles, keyed hash, short hash, a raw
//! stream cipher and random value generation.
//!
//! Everything here is a thin wrapper over the primitive crates; no protocol
//! logic lives in this crate.

#![forbid(unsafe_code)]

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::{Key, XChaCha20, XNonce};
use hmac::{Hmac, Mac};
use rand::{CryptoRng, Rng};
use sha2::{Digest, Sha256};

pub use x25519_dalek::{PublicKey, StaticSecret as SecretKey};

/// Number of bytes in an x25519 key, public or secret.
pub const KEY_SIZE: usize = 32;

/// Number of bytes in a handshake nonce.
pub const NONCE_SIZE: usize = 32;

/// Number of leading nonce bytes consumed by the stream cipher as its IV.
pub const STREAM_NONCE_SIZE: usize = 24;

/// Symmetric key derived from a Diffie-Hellman exchange. Never mutated after
/// derivation.
pub type SharedSecret = [u8; KEY_SIZE];

/// Symmetric key for established session traffic.
pub type SessionKey = [u8; KEY_SIZE];

/// Random token exchanged during the handshake for key confirmation.
pub type SessionToken = [u8; 32];

/// Output of [`short_hash`] and [`keyed_hash`].
pub type ShortHash = [u8; 32];

/// Per-message nonce carried inside handshake and relay frames.
pub type HandshakeNonce = [u8; NONCE_SIZE];

/// Generate a fresh x25519 key pair.
pub fn gen_keypair<R: Rng + CryptoRng>(rng: &mut R) -> (SecretKey, PublicKey) {
    let sk = SecretKey::random_from_rng(rng);
    let pk = PublicKey::from(&sk);
    (sk, pk)
}

/// Generate a fresh random nonce.
pub fn random_nonce<R: Rng + CryptoRng>(rng: &mut R) -> HandshakeNonce {
    let mut nonce = [0; NONCE_SIZE];
    rng.fill_bytes(&mut nonce);
    nonce
}

/// Generate a fresh random session token.
pub fn random_session_token<R: Rng + CryptoRng>(rng: &mut R) -> SessionToken {
    let mut token = [0; 32];
    rng.fill_bytes(&mut token);
    token
}

/// Unkeyed short hash (SHA-256).
pub fn short_hash(data: &[u8]) -> ShortHash {
    Sha256::digest(data).into()
}

/// Keyed hash (HMAC-SHA256) used as the message authenticator.
pub fn keyed_hash(data: &[u8], key: &[u8; KEY_SIZE]) -> ShortHash {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts a 32 byte key");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Apply the XChaCha20 keystream to `buf` in place, keyed by `key` and the
/// first [`STREAM_NONCE_SIZE`] bytes of `nonce`. The transform is its own
/// inverse.
pub fn stream_xor(buf: &mut [u8], key: &[u8; KEY_SIZE], nonce: &HandshakeNonce) {
    let mut cipher = XChaCha20::new(
        Key::from_slice(key),
        XNonce::from_slice(&nonce[..STREAM_NONCE_SIZE]),
    );
    cipher.apply_keystream(buf);
}

/// Compare two hashes over their full length, without short-circuiting on
/// the first differing byte.
pub fn hash_eq(a: &ShortHash, b: &ShortHash) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// Both DH roles bind the raw x25519 point to the key pair ordering and the
// nonce, so initiator and responder derive the same secret only when they
// agree on who played which role.
fn dh(
    initiator_pk: &PublicKey,
    responder_pk: &PublicKey,
    local_sk: &SecretKey,
    remote_pk: &PublicKey,
    nonce: &HandshakeNonce,
) -> SharedSecret {
    let point = local_sk.diffie_hellman(remote_pk);
    let mut data = [0; KEY_SIZE * 2 + NONCE_SIZE];
    data[..KEY_SIZE].copy_from_slice(initiator_pk.as_bytes());
    data[KEY_SIZE..KEY_SIZE * 2].copy_from_slice(responder_pk.as_bytes());
    data[KEY_SIZE * 2..].copy_from_slice(nonce);
    keyed_hash(&data, point.as_bytes())
}

/// Derive a shared secret in the initiator ("client") role.
pub fn dh_client(remote_pk: &PublicKey, local_sk: &SecretKey, nonce: &HandshakeNonce) -> SharedSecret {
    let local_pk = PublicKey::from(local_sk);
    dh(&local_pk, remote_pk, local_sk, remote_pk, nonce)
}

/// Derive a shared secret in the responder ("server") role.
pub fn dh_server(remote_pk: &PublicKey, local_sk: &SecretKey, nonce: &HandshakeNonce) -> SharedSecret {
    let local_pk = PublicKey::from(local_sk);
    dh(remote_pk, &local_pk, local_sk, remote_pk, nonce)
}
