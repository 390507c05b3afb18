//! Wires the ten pipeline components together into one `execute_query`
//! entry point, following the data-flow diagram of `spec.md` §2:
//! Selector → Spin-Up/Wait-Trigger → Store Locker → (Scan | Stats |
//! Passthrough) → Merger → Post-Processor → Response Writer.

pub mod locker;
pub mod merge;
pub mod passthrough;
pub mod postprocess;
pub mod scan;
pub mod selector;
pub mod spinup;
pub mod stats;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::catalog::{Catalog, TableDef};
use crate::config::ProxyConfig;
use crate::metrics::Metrics;
use crate::peer::{NodeAccessor, PeerRegistry};
use crate::request::{OutputFormat, Request};
use crate::response::{FailureReason, Response};

/// Output of [`execute_query`]: the finalized response, the resolved table
/// definition (the Response Writer needs it for the column header), and
/// `resultTotal` (§4.9/§4.10).
#[derive(Debug)]
pub struct QueryOutcome {
    pub response: Response,
    pub table: TableDef,
    pub result_total: u64,
}

/// Runs one request end to end against `registry`/`catalog` and returns the
/// finalized outcome. Returns `Err` only for the handful of fatal
/// conditions `spec.md` §7 names as global (unknown table); per-peer
/// failures are recorded into `Response.failed` instead of aborting.
pub async fn execute_query(
    request: Request,
    registry: &PeerRegistry,
    catalog: &dyn Catalog,
    node_accessor: Option<&dyn NodeAccessor>,
    config: Arc<ProxyConfig>,
    cancelled: Arc<AtomicBool>,
    metrics: &Metrics,
) -> crate::error::Result<QueryOutcome> {
    metrics.record_query(request.has_stats());

    let table = catalog
        .table(&request.table)
        .ok_or_else(|| crate::error::ProxyError::InvariantViolation(format!("unknown table {}", request.table)))?;

    let requested_backends = selector::requested_backend_ids(&request, registry);
    let mut response = Arc::new(Response::new(requested_backends.clone()));

    let selector::SelectionResult { selected, spin_up_peers, offline_peers } =
        selector::select_peers(registry, &request, node_accessor, |name| {
            catalog.table(name).map(|t| t.virtual_table).unwrap_or(false)
        });
    tracing::debug!(table = %request.table, selected = selected.len(), spin_up = spin_up_peers.len(), offline = offline_peers.len(), "peers selected");

    for id in offline_peers {
        response.record_failure(id, FailureReason::Offline("peer marked offline".into()));
    }

    if !spin_up_peers.is_empty() {
        spinup::spin_up_peers(&spin_up_peers, config.spin_up_timeout).await;
    }

    let survivors = spinup::apply_wait_trigger(selected, &request, &response).await;

    let plan = if table.passthrough_only {
        "passthrough"
    } else if table.virtual_table {
        "virtual-scan"
    } else if request.has_stats() {
        "stats"
    } else {
        "scan"
    };
    tracing::debug!(table = %request.table, plan, survivors = survivors.len(), "executing plan");

    if table.passthrough_only {
        passthrough::run_passthrough(survivors, &table, &request, &response).await;
    } else {
        let locked = locker::lock_stores(survivors, &table, &response);
        if table.virtual_table {
            merge::run_virtual_table_serially(locked, &request, &response, &config, &cancelled);
        } else {
            merge::run_non_virtual(locked, Arc::new(request.clone()), response.clone(), config.clone(), cancelled.clone()).await;
        }
    }

    for (peer, reason) in response.failed() {
        tracing::warn!(%peer, %reason, "peer contributed no rows");
        metrics.record_peer_failure();
    }

    let peer_count = response.selected_peers.len();
    let result_total = postprocess::finalize(&request, &response, peer_count, &config);

    // By this point every task holding a clone of `response` has completed
    // and dropped it, leaving this the sole strong reference; `finalize_error_state`
    // needs `&mut self` for `code`/`error`, which live outside the inner lock.
    let response_mut = Arc::get_mut(&mut response).expect("no outstanding Response clones after pipeline completion");
    response_mut.finalize_error_state(&requested_backends, matches!(request.output_format, OutputFormat::WrappedJson));

    let response = Arc::try_unwrap(response).unwrap_or_else(|_| unreachable!("checked above"));
    tracing::debug!(table = %request.table, result_total, code = response.code, "query complete");
    Ok(QueryOutcome { response, table, result_total })
}
