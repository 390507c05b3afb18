//! C7 Passthrough Executor (`spec.md` §4.7), used when `table.passthrough_only`
//! is set (e.g. `log`): queries on such tables cannot be served from a
//! cached `DataStore` and are forwarded verbatim to each peer.

use std::sync::Arc;

use crate::catalog::{ColumnStorageKind, TableDef};
use crate::peer::Peer;
use crate::request::{Request, RequestedColumn};
use crate::response::{FailureReason, PeerResponse, Response};
use crate::row::DataRow;
use crate::value::DataValue;

/// Where a virtual column's computed value is spliced back into a decoded
/// passthrough row, and the column's declared kind for synthesis.
struct VirtualSlot {
    insertion_index: usize,
    column: RequestedColumn,
}

/// Builds the stripped sub-request sent to peers — backend columns only —
/// remembering where each virtual column must be reinserted on return.
fn strip_virtual_columns(request: &Request) -> (Request, Vec<VirtualSlot>) {
    let mut backend_columns = Vec::new();
    let mut virtual_slots = Vec::new();

    for (i, col) in request.columns.iter().enumerate() {
        match col.storage_kind {
            ColumnStorageKind::Backend => backend_columns.push(col.clone()),
            ColumnStorageKind::Virtual => virtual_slots.push(VirtualSlot { insertion_index: i, column: col.clone() }),
        }
    }

    let mut stripped = request.clone();
    stripped.columns = backend_columns;
    (stripped, virtual_slots)
}

/// Computes a virtual column's value from request/peer context. Out of
/// scope for this core is the catalog's actual virtual-column registry
/// (§1 Non-goals); the one virtual column every Livestatus-style proxy
/// defines locally — the origin peer's id — is synthesized here as the
/// concrete, testable case.
fn synthesize_virtual(column: &RequestedColumn, peer: &Peer) -> DataValue {
    if column.name == "peer_key" || column.name == "site" {
        DataValue::String(peer.id.to_string())
    } else {
        DataValue::String(String::new())
    }
}

/// Decodes one peer's raw JSON result (a top-level array of row arrays,
/// matching the stripped sub-request's column order) and reinserts virtual
/// column values at their recorded slots.
fn rewrite_rows(raw: serde_json::Value, virtual_slots: &[VirtualSlot], peer: &Peer) -> Vec<DataRow> {
    let serde_json::Value::Array(raw_rows) = raw else { return Vec::new() };

    raw_rows
        .into_iter()
        .filter_map(|row_json| {
            let serde_json::Value::Array(cells) = row_json else { return None };
            let mut cells = cells.into_iter();
            let mut values = Vec::with_capacity(cells.len() + virtual_slots.len());
            let mut next_virtual = virtual_slots.iter().peekable();

            let mut idx = 0;
            loop {
                if next_virtual.peek().is_some_and(|slot| slot.insertion_index == idx) {
                    let slot = next_virtual.next().unwrap();
                    values.push(synthesize_virtual(&slot.column, peer));
                    idx += 1;
                    continue;
                }
                match cells.next() {
                    Some(cell) => {
                        values.push(json_to_data_value(cell));
                        idx += 1;
                    }
                    None => break,
                }
            }
            for slot in next_virtual {
                values.push(synthesize_virtual(&slot.column, peer));
            }

            Some(DataRow::new(values))
        })
        .collect()
}

fn json_to_data_value(v: serde_json::Value) -> DataValue {
    match v {
        serde_json::Value::String(s) => DataValue::String(s),
        serde_json::Value::Number(n) if n.is_i64() => DataValue::Int(n.as_i64().unwrap()),
        serde_json::Value::Number(n) => DataValue::Float(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::Array(items) => {
            if items.iter().all(|i| i.is_string()) {
                DataValue::StringList(items.into_iter().filter_map(|i| i.as_str().map(str::to_string)).collect())
            } else {
                DataValue::Json(serde_json::Value::Array(items))
            }
        }
        other => DataValue::Json(other),
    }
}

/// Dispatches the stripped request to each peer in parallel, decodes and
/// rewrites rows, and appends them into `response` under its writer lock
/// (§4.7: "appended to `result` under the Response lock"). Offline peers
/// have their `lastError` recorded in `failed` and are skipped.
pub async fn run_passthrough(peers: Vec<Arc<Peer>>, _table: &TableDef, request: &Request, response: &Response) {
    let (stripped, virtual_slots) = strip_virtual_columns(request);

    let mut joinset = tokio::task::JoinSet::new();
    for peer in peers {
        let stripped = stripped.clone();
        joinset.spawn(async move {
            let result = peer.pass_through_query(&stripped).await;
            (peer, result)
        });
    }

    while let Some(joined) = joinset.join_next().await {
        let Ok((peer, result)) = joined else { continue };
        match result {
            Ok(raw) => {
                let rows = rewrite_rows(raw, &virtual_slots, &peer);
                let total = rows.len() as u64;
                response.merge_peer_response(PeerResponse { rows, total, rows_scanned: total });
            }
            Err(e) => {
                peer.set_last_error(Some(e.clone()));
                response.record_failure(peer.id.clone(), FailureReason::PassthroughFailed(e));
            }
        }
    }
}
