//! C4 Store Locker (`spec.md` §4.4).

use std::sync::Arc;

use crate::catalog::TableDef;
use crate::peer::Peer;
use crate::response::{FailureReason, Response};
use crate::store::DataStore;

pub struct LockedStore {
    pub peer: Arc<Peer>,
    pub store: Arc<DataStore>,
    /// Held until the Response Writer begins, unless the table works
    /// unlocked. `None` when `table.works_unlocked`.
    pub _guard: Option<crate::store::DataSetReadGuard>,
}

/// For each selected peer, obtains its `DataStore`; on error records
/// `failed` and drops the peer. If `table.works_unlocked` is false, the
/// peer's `DataSet` read lock is acquired immediately and held for the
/// lifetime of `LockedStore` (released on drop — "scheduled on all exit
/// paths" per §4.4).
///
/// `peerLockMode` is orthogonal and handled by the scanner/writer, not
/// here (§4.4).
pub fn lock_stores(peers: Vec<Arc<Peer>>, table: &TableDef, response: &Response) -> Vec<LockedStore> {
    let mut out = Vec::with_capacity(peers.len());
    for peer in peers {
        let Some(store) = peer.data_store(&table.name) else {
            response.record_failure(
                peer.id.clone(),
                FailureReason::StoreUnavailable(format!("no data store for peer {}", peer.id)),
            );
            continue;
        };

        let guard = if !table.works_unlocked {
            match peer.dataset() {
                Some(dataset) => Some(dataset.read_guard()),
                None => {
                    response.record_failure(
                        peer.id.clone(),
                        FailureReason::StoreUnavailable(format!("no dataset for peer {}", peer.id)),
                    );
                    continue;
                }
            }
        } else {
            None
        };

        out.push(LockedStore { peer, store, _guard: guard });
    }
    out
}
