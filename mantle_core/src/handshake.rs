/*! Asynchronous execution of the link handshake.

Key exchange math is CPU-bound, so every operation is offloaded to tokio's
blocking pool and completed through a oneshot channel. Submissions never
block, each submission completes exactly once, and dropping the receiver
abandons the result without disturbing other submissions.
*/

use futures::channel::oneshot;
use rand::thread_rng;

use mantle_crypto::*;
use mantle_packet::envelope::EncryptedFrame;
use mantle_packet::errors::FrameError;
use mantle_packet::handshake::{Intro, IntroAck, SessionStart};

/// Pending result of an offloaded handshake operation. Resolves once the
/// blocking pool has run the job; dropping it cancels delivery only.
pub type Completion<T> = oneshot::Receiver<T>;

/// Runs handshake crypto on behalf of the link layer without stalling the
/// event loop.
#[derive(Clone)]
pub struct HandshakeEngine {
    /// Our long-term secret key, moved into every offloaded job.
    local_sk: SecretKey,
}

/// Run `job` on the blocking pool and hand its result to a oneshot. A
/// receiver dropped before completion just discards the value.
fn offload<T, F>(job: F) -> Completion<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::task::spawn_blocking(move || {
        let _ = tx.send(job());
    });
    rx
}

impl HandshakeEngine {
    /// Create an engine acting as `local_sk`.
    pub fn new(local_sk: SecretKey) -> HandshakeEngine {
        HandshakeEngine { local_sk }
    }

    /// Generate a fresh key pair off the event loop.
    pub fn gen_keypair() -> Completion<(SecretKey, PublicKey)> {
        offload(|| mantle_crypto::gen_keypair(&mut thread_rng()))
    }

    /// Our long-term public key.
    pub fn local_pk(&self) -> PublicKey {
        PublicKey::from(&self.local_sk)
    }

    /// Generate the first flight of an exchange with `remote_pk`.
    pub fn gen_intro(&self, remote_pk: PublicKey) -> Completion<Intro> {
        let local_sk = self.local_sk.clone();
        offload(move || Intro::new(&mut thread_rng(), &local_sk, &remote_pk))
    }

    /// Verify an incoming first flight and recover the initiator's key.
    pub fn verify_intro(&self, intro: Intro) -> Completion<Result<PublicKey, FrameError>> {
        let local_sk = self.local_sk.clone();
        offload(move || intro.verify(&local_sk))
    }

    /// Generate the second flight, issuing `token` to the initiator.
    pub fn gen_intro_ack(
        &self,
        remote_pk: PublicKey,
        token: SessionToken,
    ) -> Completion<IntroAck> {
        let local_sk = self.local_sk.clone();
        offload(move || IntroAck::new(&mut thread_rng(), &local_sk, &remote_pk, &token))
    }

    /// Verify an incoming second flight and recover the issued token.
    pub fn verify_intro_ack(
        &self,
        intro_ack: IntroAck,
        remote_pk: PublicKey,
    ) -> Completion<Result<SessionToken, FrameError>> {
        let local_sk = self.local_sk.clone();
        offload(move || intro_ack.verify(&local_sk, &remote_pk))
    }

    /// Generate the third flight and the initiator's session key.
    pub fn gen_session_start(
        &self,
        remote_pk: PublicKey,
        token: SessionToken,
    ) -> Completion<(SessionStart, SessionKey)> {
        let local_sk = self.local_sk.clone();
        offload(move || SessionStart::new(&mut thread_rng(), &local_sk, &remote_pk, &token))
    }

    /// Verify an incoming third flight against the token we issued and derive
    /// the responder's session key.
    pub fn verify_session_start(
        &self,
        session_start: SessionStart,
        remote_pk: PublicKey,
        token: SessionToken,
    ) -> Completion<Result<SessionKey, FrameError>> {
        let local_sk = self.local_sk.clone();
        offload(move || session_start.verify(&local_sk, &remote_pk, &token))
    }

    /// Seal `payload` into an envelope only `remote_pk` can open.
    pub fn encrypt_frame(
        &self,
        payload: Vec<u8>,
        remote_pk: PublicKey,
    ) -> Completion<Result<EncryptedFrame, FrameError>> {
        let local_sk = self.local_sk.clone();
        offload(move || {
            let mut frame = EncryptedFrame::from_payload(&payload);
            frame.encrypt_in_place(&mut thread_rng(), &local_sk, &remote_pk)?;
            Ok(frame)
        })
    }

    /// Open an envelope addressed to us, yielding its plaintext.
    pub fn decrypt_frame(
        &self,
        mut frame: EncryptedFrame,
    ) -> Completion<Result<Vec<u8>, FrameError>> {
        let local_sk = self.local_sk.clone();
        offload(move || frame.decrypt_in_place(&local_sk).map(<[u8]>::to_vec))
    }
}
