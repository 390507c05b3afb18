//! C2 Spin-Up Coordinator and C3 Wait-Trigger (`spec.md` §4.2, §4.3).
//!
//! Fan-out pattern grounded on `reference/networking/routing/dispatcher.rs`'s
//! `JoinSet`-based scatter/broadcast-with-deadline.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::peer::Peer;
use crate::request::Request;
use crate::response::{FailureReason, Response};

/// Triggers a delta refresh on each idle peer in parallel and waits for all
/// of them or `timeout`, whichever comes first (§4.2). Failures propagate to
/// the peer's own error state but never fail the request; a peer that is
/// still unreadable afterward is reported in `failed` later by the Store
/// Locker (§4.4), not here.
pub async fn spin_up_peers(peers: &[Arc<Peer>], timeout: Duration) {
    if peers.is_empty() {
        return;
    }

    let mut joinset = JoinSet::new();
    for peer in peers.iter().cloned() {
        joinset.spawn(async move {
            match peer.resume_from_idle().await {
                Ok(()) => peer.set_idling(false),
                Err(e) => {
                    tracing::warn!(peer = %peer.id, error = %e, "spin-up failed");
                    peer.set_last_error(Some(e));
                }
            }
        });
    }

    let _ = tokio::time::timeout(timeout, async {
        while joinset.join_next().await.is_some() {}
    })
    .await;
    // Unconditional return on timeout: any still-running spin-ups are left
    // to finish in the background; their peers remain idling until they do.
}

/// C3: if `request.wait_trigger` is set, invokes `WaitCondition` on each
/// selected peer serially, then re-fetches its data store. Peers whose
/// store becomes unavailable are recorded in `failed` and excluded from
/// scanning (§4.3).
pub async fn apply_wait_trigger(peers: Vec<Arc<Peer>>, request: &Request, response: &Response) -> Vec<Arc<Peer>> {
    if request.wait_trigger.is_none() {
        return peers;
    }

    let mut survivors = Vec::with_capacity(peers.len());
    for peer in peers {
        if let Err(e) = peer.wait_condition(request).await {
            response.record_failure(peer.id.clone(), FailureReason::WaitTriggerFailed(e));
            continue;
        }
        if peer.data_store(&request.table).is_none() {
            response.record_failure(
                peer.id.clone(),
                FailureReason::StoreUnavailable(format!("store unavailable for peer {}", peer.id)),
            );
            continue;
        }
        survivors.push(peer);
    }
    survivors
}
