//! C8 Merger (`spec.md` §4.8). Collects per-peer sub-results from parallel
//! scan/stats tasks and folds them into the shared [`Response`].
//!
//! Grounded on `reference/networking/routing/dispatcher.rs`'s scatter-gather
//! pattern (`JoinSet` producers + a bounded `mpsc` collector), adapted from
//! "broadcast a cluster message and gather acks" to "scan N peers and gather
//! sub-results": a single consumer task drains a bounded channel while
//! producer tasks run concurrently, exactly the shape `spec.md` §5
//! describes ("single-consumer, multi-producer; capacity equals
//! `|selectedPeers|` to avoid blocking producers").

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::config::ProxyConfig;
use crate::pipeline::locker::LockedStore;
use crate::pipeline::{scan, stats};
use crate::request::Request;
use crate::response::{FailureReason, Response};

enum SubResult {
    Rows(crate::response::PeerResponse),
    Stats(crate::response::ResultSetStats),
}

/// Scans every locked store on its own task (virtual tables run on the
/// calling task instead to preserve their synthetic generator's order — see
/// `spec.md` §4.5's scheduling note; this crate has no virtual-table
/// generator of its own, so that distinction is left to the caller via
/// `run_virtual_table_serially` below), collects sub-results over a bounded
/// channel, and merges them into `response` under its writer lock.
pub async fn run_non_virtual(
    locked: Vec<LockedStore>,
    request: Arc<Request>,
    response: Arc<Response>,
    config: Arc<ProxyConfig>,
    cancelled: Arc<AtomicBool>,
) {
    if locked.is_empty() {
        return;
    }

    let (tx, mut rx) = mpsc::channel::<SubResult>(config.channel_capacity(locked.len()));
    let is_stats = request.has_stats();
    let row_context_check = config.row_context_check;
    let group_key_separator = config.group_key_separator;

    let mut joinset = JoinSet::new();
    for entry in locked {
        let request = request.clone();
        let cancelled = cancelled.clone();
        joinset.spawn_blocking(move || {
            let sub = if is_stats {
                stats::aggregate_store(&entry.store, &request, &cancelled, row_context_check, group_key_separator).map(SubResult::Stats)
            } else {
                scan::scan_store(&entry.store, &request, &cancelled, row_context_check).map(SubResult::Rows)
            };
            // entry (peer + lock guard) is held until the scan completes.
            drop(entry);
            sub
        });
    }

    let collector = async {
        while let Some(sub) = rx.recv().await {
            match sub {
                SubResult::Rows(r) => response.merge_peer_response(r),
                SubResult::Stats(s) => response.merge_stats(s),
            }
        }
    };

    let producers = async {
        while let Some(joined) = joinset.join_next().await {
            if let Ok(Some(sub)) = joined {
                let _ = tx.send(sub).await;
            }
        }
    };

    tokio::join!(producers, collector);
}

/// Virtual-table scans run serially on the calling task (§4.5) to preserve
/// the ordering inherent in their synthetic generator; there is no
/// concurrent fan-out to merge here, just a direct fold into `response`.
pub fn run_virtual_table_serially(locked: Vec<LockedStore>, request: &Request, response: &Response, config: &ProxyConfig, cancelled: &AtomicBool) {
    for entry in locked {
        if request.has_stats() {
            if let Some(sub) = stats::aggregate_store(&entry.store, request, cancelled, config.row_context_check, config.group_key_separator) {
                response.merge_stats(sub);
            }
        } else if let Some(sub) = scan::scan_store(&entry.store, request, cancelled, config.row_context_check) {
            response.merge_peer_response(sub);
        } else {
            response.record_failure(entry.peer.id.clone(), FailureReason::StoreUnavailable("scan cancelled".into()));
        }
    }
}
