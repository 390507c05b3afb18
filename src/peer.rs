//! Peer registry and collaborator traits (`spec.md` §6): `PeerMap` +
//! `PeerMapOrder` guarded by a readers-writer lock, plus the narrow async
//! surface the pipeline needs from a peer (`WaitCondition`,
//! `ResumeFromIdle`, `PassThroughQuery`).
//!
//! Grounded on `reference/networking/routing/table.rs`'s routing-table
//! registry shape. Deliberately *not* `DashMap` (see DESIGN.md): the
//! insertion order `spec.md` §4.1 requires for deterministic output must
//! stay consistent with the map under one lock, which a sharded map does
//! not guarantee across concurrent inserts.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::request::Request;
use crate::store::{DataSet, DataStore};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub String);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        PeerId(s.to_string())
    }
}

/// Per-peer boolean flags `spec.md` §4.1 filters on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerFlags {
    /// The "multi-backend aggregator" flag (§4.1 step (c)).
    pub multi_backend: bool,
}

/// Narrow async surface the pipeline needs from a peer. Implemented by
/// [`Peer`] for production and by test mocks.
#[async_trait]
pub trait PeerBackend: Send + Sync {
    async fn wait_condition(&self, request: &Request) -> Result<(), String>;
    async fn resume_from_idle(&self) -> Result<(), String>;
    async fn pass_through_query(&self, request: &Request) -> Result<serde_json::Value, String>;
}

/// External cluster-ownership collaborator (`spec.md` §6's
/// `nodeAccessor.IsOurBackend`). Its *absence* (no `Arc<dyn NodeAccessor>`
/// configured), not a trivial `true`-returning impl, is what the spec means
/// by "nil means always true" — see `pipeline::selector`.
pub trait NodeAccessor: Send + Sync {
    fn is_our_backend(&self, peer: &PeerId) -> bool;
}

pub struct Peer {
    pub id: PeerId,
    pub flags: PeerFlags,
    idling: AtomicBool,
    online: AtomicBool,
    last_error: RwLock<Option<String>>,
    /// `Peer`'s reference to its own [`DataSet`] (`spec.md` §9 arena-index
    /// design: the peer holds this one handle rather than a per-table
    /// back-reference, and `DataSet::get` resolves individual `DataStore`s
    /// by table name).
    dataset: RwLock<Option<Arc<DataSet>>>,
    backend: Arc<dyn PeerBackend>,
}

impl Peer {
    pub fn new(id: PeerId, flags: PeerFlags, backend: Arc<dyn PeerBackend>) -> Self {
        Self {
            id,
            flags,
            idling: AtomicBool::new(false),
            online: AtomicBool::new(true),
            last_error: RwLock::new(None),
            dataset: RwLock::new(None),
            backend,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    pub fn is_idling(&self) -> bool {
        self.idling.load(Ordering::Acquire)
    }

    pub fn set_idling(&self, idling: bool) {
        self.idling.store(idling, Ordering::Release);
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    pub fn set_last_error(&self, err: Option<String>) {
        *self.last_error.write() = err;
    }

    pub fn set_dataset(&self, dataset: Option<Arc<DataSet>>) {
        *self.dataset.write() = dataset;
    }

    pub fn dataset(&self) -> Option<Arc<DataSet>> {
        self.dataset.read().clone()
    }

    /// `Peer.GetDataStore(table)`. `spec.md` §4.4: errors are recorded by
    /// the caller into `failed`, not raised here.
    pub fn data_store(&self, table: &str) -> Option<Arc<DataStore>> {
        self.dataset.read().as_ref().and_then(|ds| ds.get(table))
    }

    pub async fn wait_condition(&self, request: &Request) -> Result<(), String> {
        self.backend.wait_condition(request).await
    }

    pub async fn resume_from_idle(&self) -> Result<(), String> {
        self.backend.resume_from_idle().await
    }

    pub async fn pass_through_query(&self, request: &Request) -> Result<serde_json::Value, String> {
        self.backend.pass_through_query(request).await
    }
}

/// `PeerMap` + `PeerMapOrder`: a map for lookup and a vector preserving
/// catalog/insertion order, both guarded by the same lock so the two never
/// drift apart under concurrent registration.
#[derive(Default)]
pub struct PeerRegistry {
    inner: RwLock<PeerRegistryInner>,
}

#[derive(Default)]
struct PeerRegistryInner {
    peers: HashMap<PeerId, Arc<Peer>>,
    order: Vec<PeerId>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, peer: Arc<Peer>) {
        let mut inner = self.inner.write();
        if !inner.peers.contains_key(&peer.id) {
            inner.order.push(peer.id.clone());
        }
        inner.peers.insert(peer.id.clone(), peer);
    }

    pub fn get(&self, id: &PeerId) -> Option<Arc<Peer>> {
        self.inner.read().peers.get(id).cloned()
    }

    /// Peers in catalog/insertion order — the order responses depend on for
    /// deterministic sort tie-break (`spec.md` §4.1).
    pub fn ordered(&self) -> Vec<Arc<Peer>> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.peers.get(id).cloned())
            .collect()
    }
}
