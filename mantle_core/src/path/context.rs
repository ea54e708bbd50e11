/*! Registry of paths this node owns and hops it relays for others.

Two independently locked multi-maps keyed by `PathId`. Ids are only unique
per neighbor, so a key can hold several values and lookups disambiguate by
neighbor identity. Every path and hop lives in its table under both of its
ids, and the two entries are always inserted and removed under one lock
acquisition so no reader ever observes a split pair.
*/

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use mantle_crypto::*;
use mantle_packet::envelope::EncryptedFrame;
use mantle_packet::path_id::PathId;
use mantle_packet::relay::{LinkPacket, RelayCommit};

use crate::path::errors::PathError;
use crate::path::transit::{TransitHop, TransitHopInfo};
use crate::path::{Path, PathBuilder, Tx};

type MultiMap<V> = Mutex<HashMap<PathId, Vec<V>>>;

/// Insert `value` under both of its ids.
fn map_put<V: Clone>(table: &MultiMap<V>, keys: (PathId, PathId), value: &V) {
    let mut table = table.lock().expect("path table lock poisoned");
    table.entry(keys.0).or_default().push(value.clone());
    table.entry(keys.1).or_default().push(value.clone());
}

/// First value under `key` matching `pred`.
fn map_get<V, P>(table: &MultiMap<V>, key: &PathId, pred: P) -> Option<V>
where
    V: Clone,
    P: Fn(&V) -> bool,
{
    table
        .lock()
        .expect("path table lock poisoned")
        .get(key)
        .and_then(|values| values.iter().find(|value| pred(value)).cloned())
}

/// Whether any value under `key` matches `pred`.
fn map_has<V, P>(table: &MultiMap<V>, key: &PathId, pred: P) -> bool
where
    V: Clone,
    P: Fn(&V) -> bool,
{
    map_get(table, key, pred).is_some()
}

/// Remove every value under both ids matching `pred`.
fn map_del<V, P>(table: &MultiMap<V>, keys: (PathId, PathId), pred: P)
where
    P: Fn(&V) -> bool,
{
    let mut table = table.lock().expect("path table lock poisoned");
    erase(&mut table, &keys.0, &pred);
    erase(&mut table, &keys.1, &pred);
}

/// Remove values matching `pred` at `key` on an already locked table,
/// dropping the key when it empties.
fn erase<V, P>(table: &mut HashMap<PathId, Vec<V>>, key: &PathId, pred: &P)
where
    P: Fn(&V) -> bool,
{
    if let Some(values) = table.get_mut(key) {
        values.retain(|value| !pred(value));
        if values.is_empty() {
            table.remove(key);
        }
    }
}

/// Whatever a frame for a given id resolves to: a path we own or a hop we
/// relay.
#[derive(Clone)]
pub enum HopHandler {
    /// We are the owner of the path.
    Own(Arc<Mutex<Path>>),
    /// We relay this hop for someone else.
    Transit(Arc<TransitHop>),
}

/// Concurrent registry of own paths and transit hops, plus the builders it
/// polls each sweep cycle.
pub struct PathContext {
    local_pk: PublicKey,
    allow_transit: AtomicBool,
    our_paths: MultiMap<Arc<Mutex<Path>>>,
    transit_paths: MultiMap<Arc<TransitHop>>,
    builders: Mutex<Vec<Arc<dyn PathBuilder>>>,
    frame_tx: Tx,
}

impl PathContext {
    /// Create an empty registry acting as `local_pk`, not relaying.
    pub fn new(local_pk: PublicKey, frame_tx: Tx) -> PathContext {
        PathContext {
            local_pk,
            allow_transit: AtomicBool::new(false),
            our_paths: Mutex::new(HashMap::new()),
            transit_paths: Mutex::new(HashMap::new()),
            builders: Mutex::new(Vec::new()),
            frame_tx,
        }
    }

    /// Switch relaying of foreign hops on or off.
    pub fn allow_transit(&self, allow: bool) {
        self.allow_transit.store(allow, Ordering::Relaxed);
    }

    /// Whether this node currently relays foreign hops.
    pub fn allowing_transit(&self) -> bool {
        self.allow_transit.load(Ordering::Relaxed)
    }

    /// Whether a hop record names this node.
    pub fn hop_is_us(&self, pk: &PublicKey) -> bool {
        *pk == self.local_pk
    }

    /// Register a freshly built path under both of its ids.
    pub fn add_own_path(&self, path: Path) -> Arc<Mutex<Path>> {
        let keys = (path.tx_id(), path.rx_id());
        let path = Arc::new(Mutex::new(path));
        map_put(&self.our_paths, keys, &path);
        path
    }

    /// Drop a path from the registry, both ids at once.
    pub fn remove_own_path(&self, path: &Arc<Mutex<Path>>) {
        let keys = {
            let path = path.lock().expect("path lock poisoned");
            (path.tx_id(), path.rx_id())
        };
        map_del(&self.our_paths, keys, |other| Arc::ptr_eq(other, path));
    }

    /// Register an accepted transit hop under both of its ids.
    pub fn put_transit_hop(&self, hop: TransitHop) -> Arc<TransitHop> {
        let keys = (hop.info.tx_id, hop.info.rx_id);
        let hop = Arc::new(hop);
        map_put(&self.transit_paths, keys, &hop);
        hop
    }

    /// Whether a hop with exactly this identity is already registered.
    pub fn has_transit_hop(&self, info: &TransitHopInfo) -> bool {
        map_has(&self.transit_paths, &info.tx_id, |hop| hop.info == *info)
    }

    /// Resolve a frame arriving from `remote` on the upstream side: our own
    /// paths answer first (replies come from hop 0), then transit hops whose
    /// upstream neighbor is `remote`.
    pub fn get_by_upstream(&self, remote: &PublicKey, id: &PathId) -> Option<HopHandler> {
        map_get(&self.our_paths, id, |_| true)
            .map(HopHandler::Own)
            .or_else(|| {
                map_get(&self.transit_paths, id, |hop| hop.info.upstream == *remote)
                    .map(HopHandler::Transit)
            })
    }

    /// Resolve a frame arriving from `remote` on the downstream side. Only
    /// transit hops qualify; frames we originate never come back this way.
    pub fn get_by_downstream(&self, remote: &PublicKey, id: &PathId) -> Option<HopHandler> {
        map_get(&self.transit_paths, id, |hop| hop.info.downstream == *remote)
            .map(HopHandler::Transit)
    }

    /// Queue a batch of relay-commit envelopes to the next hop of a path
    /// under construction.
    pub fn forward_relay_commit(
        &self,
        next_hop: PublicKey,
        frames: Vec<EncryptedFrame>,
    ) -> Result<(), PathError> {
        self.frame_tx
            .unbounded_send((next_hop, LinkPacket::RelayCommit(RelayCommit { frames })))
            .map_err(|_| PathError::SendTo)
    }

    /// Register a builder to poll on every sweep cycle.
    pub fn add_path_builder(&self, builder: Arc<dyn PathBuilder>) {
        self.builders
            .lock()
            .expect("builder list lock poisoned")
            .push(builder);
    }

    /// Ask every registered builder once whether it wants another path.
    pub fn build_paths(&self) {
        for builder in self.builders.lock().expect("builder list lock poisoned").iter() {
            if builder.should_build_more() {
                builder.build_one();
            }
        }
    }

    /** Periodic sweep. Collects expired transit hops under the lock, then
    re-acquires it once to erase both entries of every collected hop, so the
    table is never mutated while it is iterated. Own-path expiry is delegated
    to the registered builders.
    */
    pub fn expire_paths(&self, now: Instant) {
        let doomed = {
            let table = self.transit_paths.lock().expect("path table lock poisoned");
            let mut doomed: Vec<Arc<TransitHop>> = Vec::new();
            for hop in table.values().flatten() {
                if hop.expired(now) && !doomed.iter().any(|d| Arc::ptr_eq(d, hop)) {
                    doomed.push(Arc::clone(hop));
                }
            }
            doomed
        };

        if !doomed.is_empty() {
            debug!("sweeping {} expired transit hops", doomed.len());
            let mut table = self.transit_paths.lock().expect("path table lock poisoned");
            for hop in &doomed {
                erase(&mut table, &hop.info.tx_id, &|other| Arc::ptr_eq(other, hop));
                erase(&mut table, &hop.info.rx_id, &|other| Arc::ptr_eq(other, hop));
            }
        }

        for builder in self.builders.lock().expect("builder list lock poisoned").iter() {
            builder.expire_paths(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use futures::channel::mpsc;
    use rand::{CryptoRng, Rng, thread_rng};

    use crate::path::{DEFAULT_PATH_LIFETIME, PathHop};
    use crate::time::clock_now;

    fn test_context() -> PathContext {
        let (tx, rx) = mpsc::unbounded();
        // Keep the transport alive for the lifetime of the context.
        std::mem::forget(rx);
        PathContext::new(gen_keypair(&mut thread_rng()).1, tx)
    }

    fn test_hop_info(rng: &mut (impl Rng + CryptoRng)) -> TransitHopInfo {
        TransitHopInfo {
            upstream: PublicKey::from(rng.gen::<[u8; KEY_SIZE]>()),
            downstream: PublicKey::from(rng.gen::<[u8; KEY_SIZE]>()),
            tx_id: PathId::random(rng),
            rx_id: PathId::random(rng),
        }
    }

    fn test_path() -> Path {
        let mut rng = thread_rng();
        let hops = vec![
            PathHop {
                router: gen_keypair(&mut rng).1,
                shared: [1; 32],
                lifetime: DEFAULT_PATH_LIFETIME,
            };
            3
        ];
        let (tx, rx) = mpsc::unbounded();
        std::mem::forget(rx);
        Path::new(&mut rng, &hops, tx)
    }

    // Every registered hop must be reachable under both of its ids, with
    // ptr-equal entries.
    fn assert_pairs_intact(context: &PathContext) {
        let table = context.transit_paths.lock().unwrap();
        for (key, hops) in table.iter() {
            for hop in hops {
                assert!(*key == hop.info.tx_id || *key == hop.info.rx_id);
                let partner = if *key == hop.info.tx_id { hop.info.rx_id } else { hop.info.tx_id };
                let intact = table
                    .get(&partner)
                    .map(|others| others.iter().any(|other| Arc::ptr_eq(other, hop)))
                    .unwrap_or(false);
                assert!(intact, "hop present under only one of its ids");
            }
        }
    }

    #[test]
    fn own_path_is_registered_under_both_ids() {
        let context = test_context();
        let path = context.add_own_path(test_path());
        let (tx_id, rx_id, upstream) = {
            let path = path.lock().unwrap();
            (path.tx_id(), path.rx_id(), path.upstream())
        };

        for id in [tx_id, rx_id] {
            match context.get_by_upstream(&upstream, &id) {
                Some(HopHandler::Own(found)) => assert!(Arc::ptr_eq(&found, &path)),
                _ => panic!("own path not found under id {:?}", id),
            }
        }

        context.remove_own_path(&path);
        assert!(context.get_by_upstream(&upstream, &tx_id).is_none());
        assert!(context.get_by_upstream(&upstream, &rx_id).is_none());
    }

    #[test]
    fn transit_lookup_disambiguates_by_neighbor() {
        let mut rng = thread_rng();
        let context = test_context();

        // Two hops sharing one id, distinguishable only by their neighbors.
        let mut info_a = test_hop_info(&mut rng);
        let mut info_b = test_hop_info(&mut rng);
        info_b.rx_id = info_a.rx_id;
        info_a.tx_id = info_a.rx_id;
        info_b.tx_id = info_b.rx_id;

        let hop_a = context.put_transit_hop(TransitHop::new(info_a.clone(), [1; 32], DEFAULT_PATH_LIFETIME));
        let hop_b = context.put_transit_hop(TransitHop::new(info_b.clone(), [2; 32], DEFAULT_PATH_LIFETIME));

        match context.get_by_upstream(&info_b.upstream, &info_a.rx_id) {
            Some(HopHandler::Transit(found)) => assert!(Arc::ptr_eq(&found, &hop_b)),
            _ => panic!("hop not found by upstream neighbor"),
        }
        match context.get_by_downstream(&info_a.downstream, &info_a.rx_id) {
            Some(HopHandler::Transit(found)) => assert!(Arc::ptr_eq(&found, &hop_a)),
            _ => panic!("hop not found by downstream neighbor"),
        }

        let stranger = PublicKey::from(rng.gen::<[u8; KEY_SIZE]>());
        assert!(context.get_by_upstream(&stranger, &info_a.rx_id).is_none());

        assert!(context.has_transit_hop(&info_a));
        assert!(context.has_transit_hop(&info_b));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_expired_hops_pairwise() {
        let mut rng = thread_rng();
        let context = test_context();

        let short = TransitHop::new(test_hop_info(&mut rng), [1; 32], Duration::from_secs(60));
        let long = TransitHop::new(test_hop_info(&mut rng), [2; 32], DEFAULT_PATH_LIFETIME);
        let short_info = short.info.clone();
        let long_info = long.info.clone();
        context.put_transit_hop(short);
        context.put_transit_hop(long);

        tokio::time::advance(Duration::from_secs(61)).await;
        context.expire_paths(clock_now());

        assert!(!context.has_transit_hop(&short_info));
        assert!(context.has_transit_hop(&long_info));
        assert_pairs_intact(&context);

        // The emptied keys must be gone, not left as empty vectors.
        let table = context.transit_paths.lock().unwrap();
        assert!(!table.contains_key(&short_info.tx_id));
        assert!(!table.contains_key(&short_info.rx_id));
    }

    #[test]
    fn concurrent_puts_and_sweeps_never_split_id_pairs() {
        let context = Arc::new(test_context());

        let workers = (0..4)
            .map(|_| {
                let context = Arc::clone(&context);
                std::thread::spawn(move || {
                    let mut rng = thread_rng();
                    for i in 0u8..50 {
                        let lifetime = if i % 2 == 0 {
                            Duration::ZERO
                        } else {
                            DEFAULT_PATH_LIFETIME
                        };
                        context.put_transit_hop(TransitHop::new(
                            test_hop_info(&mut rng),
                            [i; 32],
                            lifetime,
                        ));
                        if i % 5 == 0 {
                            context.expire_paths(clock_now());
                        }
                    }
                })
            })
            .collect::<Vec<_>>();

        for _ in 0..200 {
            assert_pairs_intact(&context);
            std::thread::yield_now();
        }

        for worker in workers {
            worker.join().unwrap();
        }

        std::thread::sleep(Duration::from_millis(1));
        context.expire_paths(clock_now());
        assert_pairs_intact(&context);

        let table = context.transit_paths.lock().unwrap();
        let now = clock_now();
        for hop in table.values().flatten() {
            assert!(!hop.expired(now));
        }
    }

    #[test]
    fn builders_are_polled_once_per_cycle() {
        struct CountingBuilder {
            wants_more: AtomicBool,
            built: AtomicUsize,
            expired: AtomicUsize,
        }

        impl PathBuilder for CountingBuilder {
            fn should_build_more(&self) -> bool {
                self.wants_more.load(Ordering::Relaxed)
            }
            fn build_one(&self) {
                self.built.fetch_add(1, Ordering::Relaxed);
            }
            fn expire_paths(&self, _now: Instant) {
                self.expired.fetch_add(1, Ordering::Relaxed);
            }
        }

        let context = test_context();
        let builder = Arc::new(CountingBuilder {
            wants_more: AtomicBool::new(true),
            built: AtomicUsize::new(0),
            expired: AtomicUsize::new(0),
        });
        context.add_path_builder(builder.clone());

        context.build_paths();
        assert_eq!(builder.built.load(Ordering::Relaxed), 1);

        builder.wants_more.store(false, Ordering::Relaxed);
        context.build_paths();
        assert_eq!(builder.built.load(Ordering::Relaxed), 1);

        context.expire_paths(clock_now());
        assert_eq!(builder.expired.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn transit_switch_defaults_off() {
        let context = test_context();
        assert!(!context.allowing_transit());
        context.allow_transit(true);
        assert!(context.allowing_transit());
        assert!(context.hop_is_us(&context.local_pk));
    }

    #[test]
    fn forward_relay_commit_reaches_the_transport() {
        let (tx, mut rx) = mpsc::unbounded();
        let mut rng = thread_rng();
        let context = PathContext::new(gen_keypair(&mut rng).1, tx);
        let next_hop = gen_keypair(&mut rng).1;

        let frames = vec![EncryptedFrame::from_payload(&[42; 16])];
        context.forward_relay_commit(next_hop, frames.clone()).unwrap();

        match rx.try_next().unwrap().unwrap() {
            (to, LinkPacket::RelayCommit(commit)) => {
                assert_eq!(to, next_hop);
                assert_eq!(commit.frames, frames);
            },
            _ => panic!("unexpected link packet"),
        }
    }
}
