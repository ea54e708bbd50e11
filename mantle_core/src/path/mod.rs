/*! Client-owned onion circuits and the relay-side records of circuits this
node forwards for others.

A `Path` owns one pre-negotiated shared secret per hop and applies one
stream-cipher layer per hop to everything it sends or receives. Hop 0 is the
nearest neighbor; its id pair is how the rest of the network addresses the
path. All mutation happens on the single context that drains handshake
completions and inbound frames, so a path is never locked across an await.
*/

pub mod context;
pub mod errors;
pub mod transit;

pub use self::context::*;
pub use self::errors::*;
pub use self::transit::*;

use std::time::{Duration, Instant};

use futures::channel::{mpsc, oneshot};
use rand::{CryptoRng, Rng, thread_rng};

use mantle_binary_io::*;
use mantle_crypto::*;
use mantle_packet::path_id::PathId;
use mantle_packet::relay::{LinkPacket, RelayUpstream};
use mantle_packet::routing::{PathLatency, RoutingMessage};

use crate::time::{clock_elapsed, clock_now};
use crate::utils::gen_probe_token;

/// How long a path may stay `Building` before the sweep reaps it.
pub const PATH_BUILD_TIMEOUT: Duration = Duration::from_secs(30);

/// Hop lifetime used when the builder does not pick one.
pub const DEFAULT_PATH_LIFETIME: Duration = Duration::from_secs(600);

/// Serialized routing messages must fit this buffer.
pub const MAX_ROUTING_MESSAGE_SIZE: usize = 2048;

/// Sink to the transport: frames addressed to a neighbor by public key.
pub type Tx = mpsc::UnboundedSender<(PublicKey, LinkPacket)>;

/// One hop as supplied by the path builder: where it is and what secret was
/// negotiated with it.
#[derive(Clone)]
pub struct PathHop {
    /// The hop's router.
    pub router: PublicKey,
    /// Shared secret negotiated with the hop.
    pub shared: SharedSecret,
    /// How long the hop agreed to keep the path.
    pub lifetime: Duration,
}

/// One hop of a built path. Immutable once the path is constructed.
#[derive(Clone)]
pub struct PathHopConfig {
    /// The hop's router.
    pub router: PublicKey,
    /// Id this hop forwards our upstream traffic under.
    pub tx_id: PathId,
    /// Id this hop receives our upstream traffic under.
    pub rx_id: PathId,
    /// Shared secret for the hop's onion layer.
    pub shared: SharedSecret,
    /// How long the hop agreed to keep the path.
    pub lifetime: Duration,
}

/// Stored lifecycle state of a path. Expiry is derived from the clock, not
/// stored.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PathStatus {
    /// Commit records are out, no confirmation yet.
    Building,
    /// The terminal hop confirmed the build.
    Established,
}

/// A client-owned multi-hop circuit.
pub struct Path {
    hops: Vec<PathHopConfig>,
    status: PathStatus,
    build_started: Instant,
    latency: Option<Duration>,
    latency_probe: Option<(u64, Instant)>,
    built_hook: Option<oneshot::Sender<()>>,
    frame_tx: Tx,
}

impl Path {
    /** Build a path over `hops` (nearest first). Both ids of every hop are
    random, then linked so that each hop forwards under the id the next hop
    receives by.

    Panics when `hops` is empty; the builder always supplies at least one.
    */
    pub fn new<R: Rng + CryptoRng>(rng: &mut R, hops: &[PathHop], frame_tx: Tx) -> Path {
        assert!(!hops.is_empty(), "a path needs at least one hop");

        let mut configs = hops
            .iter()
            .map(|hop| PathHopConfig {
                router: hop.router,
                tx_id: PathId::random(rng),
                rx_id: PathId::random(rng),
                shared: hop.shared,
                lifetime: hop.lifetime,
            })
            .collect::<Vec<_>>();
        for i in 0..configs.len() - 1 {
            configs[i].tx_id = configs[i + 1].rx_id;
        }

        Path {
            hops: configs,
            status: PathStatus::Building,
            build_started: clock_now(),
            latency: None,
            latency_probe: None,
            built_hook: None,
            frame_tx,
        }
    }

    /// Id our upstream frames carry toward hop 0.
    pub fn tx_id(&self) -> PathId {
        self.hops[0].tx_id
    }

    /// Id downstream frames carry when hop 0 hands them to us.
    pub fn rx_id(&self) -> PathId {
        self.hops[0].rx_id
    }

    /// The nearest neighbor, where all our upstream traffic goes.
    pub fn upstream(&self) -> PublicKey {
        self.hops[0].router
    }

    /// The hops of the path, nearest first.
    pub fn hops(&self) -> &[PathHopConfig] {
        &self.hops
    }

    /// Current lifecycle state.
    pub fn status(&self) -> PathStatus {
        self.status
    }

    /// Last measured round-trip latency, if any probe completed.
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    /// Register the build-completion promise. Fired exactly once, on the
    /// first PathConfirm.
    pub fn set_built_hook(&mut self, hook: oneshot::Sender<()>) {
        self.built_hook = Some(hook);
    }

    /// One stream-cipher pass per hop, nearest to farthest. Applying the
    /// full chain twice under the same nonce restores the input.
    fn onion_transform(&self, nonce: &HandshakeNonce, buf: &mut [u8]) {
        for hop in &self.hops {
            stream_xor(buf, &hop.shared, nonce);
        }
    }

    /// Layer `payload` and hand it to the transport toward hop 0.
    pub fn handle_upstream(
        &mut self,
        nonce: HandshakeNonce,
        mut payload: Vec<u8>,
    ) -> Result<(), PathError> {
        self.onion_transform(&nonce, &mut payload);
        let packet = LinkPacket::RelayUpstream(RelayUpstream {
            path_id: self.tx_id(),
            nonce,
            payload,
        });
        self.frame_tx
            .unbounded_send((self.upstream(), packet))
            .map_err(|_| PathError::SendTo)
    }

    /// Unlayer an inbound frame and dispatch the routing message it carries.
    pub fn handle_downstream(
        &mut self,
        nonce: HandshakeNonce,
        mut payload: Vec<u8>,
    ) -> Result<(), PathError> {
        self.onion_transform(&nonce, &mut payload);
        let (_, message) =
            RoutingMessage::from_bytes(&payload).map_err(|_| PathError::InvalidMessage)?;
        match message {
            RoutingMessage::PathConfirm(_) => self.handle_path_confirm(),
            RoutingMessage::PathLatency(latency) => self.handle_path_latency(latency),
            RoutingMessage::PathTransfer(_) => {
                warn!("PathTransfer on path {:?}, not handled by this core", self.rx_id());
                Err(PathError::UnexpectedTransfer)
            },
            RoutingMessage::DhtMessage(_) => {
                warn!("DHT message on path {:?}, not handled by this core", self.rx_id());
                Err(PathError::DhtUnhandled)
            },
        }
    }

    /// Serialize a routing message and send it upstream under a fresh nonce.
    pub fn send_routing_message(&mut self, message: &RoutingMessage) -> Result<(), PathError> {
        let mut buf = [0; MAX_ROUTING_MESSAGE_SIZE];
        let (_, size) = message
            .to_bytes((&mut buf, 0))
            .map_err(|_| PathError::Serialize)?;
        let nonce = random_nonce(&mut thread_rng());
        self.handle_upstream(nonce, buf[..size].to_vec())
    }

    /// First confirmation establishes the path, fires the build promise and
    /// launches a latency probe. Any further confirmation is a protocol
    /// violation that leaves the path untouched.
    fn handle_path_confirm(&mut self) -> Result<(), PathError> {
        if self.status != PathStatus::Building {
            warn!("PathConfirm on established path {:?}", self.rx_id());
            return Err(PathError::UnexpectedConfirm);
        }

        self.status = PathStatus::Established;
        debug!("path {:?} established", self.rx_id());
        if let Some(hook) = self.built_hook.take() {
            // The builder may have stopped listening, which is fine.
            let _ = hook.send(());
        }

        let token = gen_probe_token();
        self.latency_probe = Some((token, clock_now()));
        self.send_routing_message(&RoutingMessage::PathLatency(PathLatency { token }))
    }

    /// An echo with the outstanding token completes the measurement. Stale
    /// or unknown tokens are dropped.
    fn handle_path_latency(&mut self, latency: PathLatency) -> Result<(), PathError> {
        match self.latency_probe {
            Some((token, sent)) if token == latency.token => {
                self.latency = Some(clock_elapsed(sent));
                self.latency_probe = None;
                trace!("path {:?} latency {:?}", self.rx_id(), self.latency);
            },
            _ => trace!("unmatched latency token {} on path {:?}", latency.token, self.rx_id()),
        }
        Ok(())
    }

    /// Hidden-service payloads are owned by an external collaborator.
    pub fn handle_hidden_service_data(&mut self, _payload: &[u8]) -> Result<(), PathError> {
        Err(PathError::HiddenServiceUnhandled)
    }

    /// Whether the sweep should reap this path. An established path lives
    /// for hop 0's lifetime from build start; a building one gets
    /// [`PATH_BUILD_TIMEOUT`].
    pub fn expired(&self, now: Instant) -> bool {
        let age = now.saturating_duration_since(self.build_started);
        match self.status {
            PathStatus::Established => age > self.hops[0].lifetime,
            PathStatus::Building => age > PATH_BUILD_TIMEOUT,
        }
    }
}

/// Decides when to grow the path set and reaps its own paths. Implemented
/// by the external builder, polled once per sweep cycle.
pub trait PathBuilder: Send + Sync {
    /// Whether the builder wants another path right now.
    fn should_build_more(&self) -> bool;
    /// Start building one more path.
    fn build_one(&self);
    /// Drop own paths that are expired at `now`.
    fn expire_paths(&self, now: Instant);
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use mantle_packet::routing::PathConfirm;

    fn test_hops(n: usize) -> Vec<PathHop> {
        let mut rng = thread_rng();
        (0..n)
            .map(|i| PathHop {
                router: gen_keypair(&mut rng).1,
                shared: [i as u8 + 1; 32],
                lifetime: DEFAULT_PATH_LIFETIME,
            })
            .collect()
    }

    // Deliver a routing message to the path as if it had traversed every
    // hop: the transform is an involution, so pre-layering the plaintext
    // makes handle_downstream recover it.
    fn deliver(path: &mut Path, message: &RoutingMessage) -> Result<(), PathError> {
        let mut buf = [0; MAX_ROUTING_MESSAGE_SIZE];
        let (_, size) = message.to_bytes((&mut buf, 0)).unwrap();
        let mut payload = buf[..size].to_vec();
        let nonce = random_nonce(&mut thread_rng());
        for hop in path.hops() {
            stream_xor(&mut payload, &hop.shared, &nonce);
        }
        path.handle_downstream(nonce, payload)
    }

    fn emitted_message(path: &Path, packet: LinkPacket) -> RoutingMessage {
        let (path_id, nonce, mut payload) = match packet {
            LinkPacket::RelayUpstream(frame) => (frame.path_id, frame.nonce, frame.payload),
            other => panic!("unexpected link packet {:?}", other),
        };
        assert_eq!(path_id, path.tx_id());
        for hop in path.hops() {
            stream_xor(&mut payload, &hop.shared, &nonce);
        }
        let (_, message) = RoutingMessage::from_bytes(&payload).unwrap();
        message
    }

    #[test]
    fn path_ids_form_a_chain() {
        let (tx, _rx) = mpsc::unbounded();
        let path = Path::new(&mut thread_rng(), &test_hops(4), tx);

        let hops = path.hops();
        for i in 0..hops.len() - 1 {
            assert_eq!(hops[i].tx_id, hops[i + 1].rx_id);
        }
        assert_eq!(path.tx_id(), hops[0].tx_id);
        assert_eq!(path.rx_id(), hops[0].rx_id);
    }

    #[tokio::test(start_paused = true)]
    async fn path_build_scenario() {
        let (tx, mut rx) = mpsc::unbounded();
        let mut path = Path::new(&mut thread_rng(), &test_hops(3), tx);
        let (hook_tx, mut hook_rx) = oneshot::channel();
        path.set_built_hook(hook_tx);
        assert_eq!(path.status(), PathStatus::Building);

        deliver(&mut path, &RoutingMessage::PathConfirm(PathConfirm)).unwrap();
        assert_eq!(path.status(), PathStatus::Established);
        assert_eq!(hook_rx.try_recv(), Ok(Some(())));

        // The confirmation triggers a latency probe with a nonzero token.
        let (to, packet) = rx.next().await.unwrap();
        assert_eq!(to, path.upstream());
        let token = match emitted_message(&path, packet) {
            RoutingMessage::PathLatency(probe) => probe.token,
            other => panic!("unexpected routing message {:?}", other),
        };
        assert_ne!(token, 0);

        let delay = Duration::from_millis(250);
        tokio::time::advance(delay).await;

        deliver(&mut path, &RoutingMessage::PathLatency(PathLatency { token })).unwrap();
        assert_eq!(path.latency(), Some(delay));
    }

    #[tokio::test(start_paused = true)]
    async fn second_confirm_is_a_protocol_violation() {
        let (tx, _rx) = mpsc::unbounded();
        let mut path = Path::new(&mut thread_rng(), &test_hops(3), tx);

        deliver(&mut path, &RoutingMessage::PathConfirm(PathConfirm)).unwrap();
        assert_eq!(path.status(), PathStatus::Established);

        assert_eq!(
            deliver(&mut path, &RoutingMessage::PathConfirm(PathConfirm)),
            Err(PathError::UnexpectedConfirm)
        );
        assert_eq!(path.status(), PathStatus::Established);
    }

    #[tokio::test(start_paused = true)]
    async fn unmatched_latency_token_is_ignored() {
        let (tx, mut rx) = mpsc::unbounded();
        let mut path = Path::new(&mut thread_rng(), &test_hops(2), tx);

        deliver(&mut path, &RoutingMessage::PathConfirm(PathConfirm)).unwrap();
        let (_, packet) = rx.next().await.unwrap();
        let token = match emitted_message(&path, packet) {
            RoutingMessage::PathLatency(probe) => probe.token,
            other => panic!("unexpected routing message {:?}", other),
        };

        deliver(
            &mut path,
            &RoutingMessage::PathLatency(PathLatency { token: token.wrapping_add(1) }),
        )
        .unwrap();
        assert_eq!(path.latency(), None);

        deliver(&mut path, &RoutingMessage::PathLatency(PathLatency { token })).unwrap();
        assert!(path.latency().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn building_path_expires_after_build_timeout() {
        let (tx, _rx) = mpsc::unbounded();
        let path = Path::new(&mut thread_rng(), &test_hops(2), tx);

        assert!(!path.expired(clock_now()));
        tokio::time::advance(PATH_BUILD_TIMEOUT).await;
        assert!(!path.expired(clock_now()));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(path.expired(clock_now()));
    }

    #[tokio::test(start_paused = true)]
    async fn established_path_lives_for_hop_lifetime() {
        let (tx, _rx) = mpsc::unbounded();
        let mut hops = test_hops(2);
        hops[0].lifetime = Duration::from_secs(60);
        let mut path = Path::new(&mut thread_rng(), &hops, tx);

        deliver(&mut path, &RoutingMessage::PathConfirm(PathConfirm)).unwrap();

        tokio::time::advance(PATH_BUILD_TIMEOUT + Duration::from_secs(1)).await;
        assert!(!path.expired(clock_now()));
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(path.expired(clock_now()));
    }

    #[test]
    fn downstream_garbage_is_rejected() {
        let (tx, _rx) = mpsc::unbounded();
        let mut path = Path::new(&mut thread_rng(), &test_hops(2), tx);

        let nonce = random_nonce(&mut thread_rng());
        assert_eq!(
            path.handle_downstream(nonce, vec![0xff; 32]),
            Err(PathError::InvalidMessage)
        );
    }

    #[test]
    fn hidden_service_data_is_unhandled() {
        let (tx, _rx) = mpsc::unbounded();
        let mut path = Path::new(&mut thread_rng(), &test_hops(2), tx);
        assert_eq!(
            path.handle_hidden_service_data(&[1, 2, 3]),
            Err(PathError::HiddenServiceUnhandled)
        );
    }
}
