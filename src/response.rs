//! Response aggregation frame (`spec.md` §3): merger state, finalized
//! result set, and the per-peer failure map, all guarded by one lock per
//! the spec's "mutated only under Response's writer lock" rule (§5).

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::peer::PeerId;
use crate::request::{Direction, SortField};
use crate::row::DataRow;
use crate::value::ValueKind;

/// Why a peer contributed no rows, used only to build the exact message
/// strings `spec.md` §7 specifies through one typed constructor instead of
/// ad hoc `format!` calls scattered across pipeline stages (SPEC_FULL §10.2).
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    BadBackend(PeerId),
    Offline(String),
    StoreUnavailable(String),
    WaitTriggerFailed(String),
    PassthroughFailed(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::BadBackend(id) => write!(f, "bad request: backend {} does not exist", id),
            FailureReason::Offline(msg)
            | FailureReason::StoreUnavailable(msg)
            | FailureReason::WaitTriggerFailed(msg)
            | FailureReason::PassthroughFailed(msg) => write!(f, "{}", msg),
        }
    }
}

/// Sub-result produced by one peer's scan/stats/passthrough task
/// (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct PeerResponse {
    pub rows: Vec<DataRow>,
    pub total: u64,
    pub rows_scanned: u64,
}

impl PeerResponse {
    pub fn empty() -> Self {
        Self { rows: Vec::new(), total: 0, rows_scanned: 0 }
    }
}

/// Per-request merger state (`spec.md` §3): concatenation of per-peer rows
/// plus running totals, for the non-stats data path.
#[derive(Debug, Clone, Default)]
pub struct RawResultSet {
    pub data_result: Vec<DataRow>,
    pub total: u64,
    pub rows_scanned: u64,
}

impl RawResultSet {
    pub fn merge(&mut self, sub: PeerResponse) {
        self.total += sub.total;
        self.rows_scanned += sub.rows_scanned;
        self.data_result.extend(sub.rows);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsAccumulator {
    pub kind: crate::request::StatsKind,
    pub value: f64,
    pub count: u64,
}

impl StatsAccumulator {
    pub fn zero(kind: crate::request::StatsKind) -> Self {
        Self { kind, value: 0.0, count: 0 }
    }

    /// Per-kind folding (`spec.md` §4.6/§4.8): identical whether folding a
    /// single row (`count=1`) in `stats.rs` or merging one peer's whole
    /// accumulator (`count=peer's row count`) into the Response under lock
    /// in `merge.rs` — associative in `count` for every kind, including
    /// Min/Max (the min of per-peer minimums is the global minimum).
    pub fn apply_value(&mut self, value: f64, count: u64) {
        use crate::request::StatsKind::*;
        match self.kind {
            Counter | Sum | Average => self.value += value,
            Min => {
                if self.count == 0 || value < self.value {
                    self.value = value;
                }
            }
            Max => {
                if self.count == 0 || value > self.value {
                    self.value = value;
                }
            }
        }
        self.count += count;
    }

    /// `spec.md` §4.9.2: finalized scalar for the given accumulator.
    pub fn finalize(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        match self.kind {
            crate::request::StatsKind::Average => self.value / self.count as f64,
            _ => self.value,
        }
    }
}

/// `ResultSetStats` (`spec.md` §3): group key → ordered accumulator list.
#[derive(Debug, Clone, Default)]
pub struct ResultSetStats {
    pub groups: HashMap<String, Vec<StatsAccumulator>>,
    pub total: u64,
    pub rows_scanned: u64,
    /// Insertion order of group keys, so output without an explicit sort
    /// over group columns still has a stable, deterministic order.
    pub group_order: Vec<String>,
}

impl ResultSetStats {
    pub fn group_mut(&mut self, key: &str, template: &[StatsAccumulator]) -> &mut Vec<StatsAccumulator> {
        if !self.groups.contains_key(key) {
            self.groups.insert(key.to_string(), template.to_vec());
            self.group_order.push(key.to_string());
        }
        self.groups.get_mut(key).unwrap()
    }

    pub fn merge(&mut self, other: ResultSetStats) {
        self.total += other.total;
        self.rows_scanned += other.rows_scanned;
        for key in other.group_order {
            let accs = other.groups.get(&key).cloned().unwrap_or_default();
            if let Some(existing) = self.groups.get_mut(&key) {
                for (e, a) in existing.iter_mut().zip(accs.iter()) {
                    e.apply_value(a.value, a.count);
                }
            } else {
                self.groups.insert(key.clone(), accs);
                self.group_order.push(key);
            }
        }
    }
}

/// `Response` (`spec.md` §3): code/error/result/failed, guarded by a single
/// writer lock for the fields scan tasks mutate concurrently.
#[derive(Debug)]
pub struct Response {
    pub code: u16,
    pub error: Option<String>,
    inner: RwLock<ResponseInner>,
    pub selected_peers: Vec<PeerId>,
}

#[derive(Debug, Default)]
struct ResponseInner {
    result: Vec<DataRow>,
    failed: HashMap<PeerId, String>,
    raw_results: RawResultSet,
    stats_result: ResultSetStats,
}

impl Response {
    pub fn new(selected_peers: Vec<PeerId>) -> Self {
        Self {
            code: 200,
            error: None,
            inner: RwLock::new(ResponseInner::default()),
            selected_peers,
        }
    }

    pub fn record_failure(&self, peer: PeerId, reason: FailureReason) {
        self.inner.write().failed.insert(peer, reason.to_string());
    }

    pub fn merge_peer_response(&self, sub: PeerResponse) {
        self.inner.write().raw_results.merge(sub);
    }

    pub fn merge_stats(&self, sub: ResultSetStats) {
        self.inner.write().stats_result.merge(sub);
    }

    pub fn failed(&self) -> HashMap<PeerId, String> {
        self.inner.read().failed.clone()
    }

    pub fn raw_results(&self) -> RawResultSet {
        self.inner.read().raw_results.clone()
    }

    pub fn stats_result(&self) -> ResultSetStats {
        self.inner.read().stats_result.clone()
    }

    pub fn set_result(&self, rows: Vec<DataRow>) {
        self.inner.write().result = rows;
    }

    pub fn result(&self) -> Vec<DataRow> {
        self.inner.read().result.clone()
    }

    /// `spec.md` §3 invariant: "If every requested backend is in `failed`
    /// and `outputFormat ≠ WrappedJSON`, `code = 502` and `error ≠ ∅`."
    pub fn finalize_error_state(&mut self, requested_backends: &[PeerId], wrapped: bool) {
        if wrapped || requested_backends.is_empty() {
            return;
        }
        let failed = self.failed();
        let all_failed = requested_backends.iter().all(|b| failed.contains_key(b));
        if all_failed {
            if let Some(first) = requested_backends.first().and_then(|b| failed.get(b)) {
                self.code = 502;
                self.error = Some(first.clone());
            }
        }
    }
}

/// Synthesizes an ascending sort over the group columns for the stats path
/// (`spec.md` §4.9 step 3): one `SortField` per leading group column, all
/// marked `group: true` per §4.9.1's "group=true ⇒ string key at index 0"
/// rule generalized to the Nth group column via `column_index`.
pub fn group_sort_fields(num_group_columns: usize) -> Vec<SortField> {
    (0..num_group_columns)
        .map(|i| SortField { column_index: i, direction: Direction::Asc, group: true })
        .collect()
}

pub fn value_kind_for_stats_sort() -> ValueKind {
    ValueKind::String
}
