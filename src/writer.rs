//! C10 Response Writer (`spec.md` §4.10, §4.10.1, §6): renders the finalized
//! [`Response`] as one of two JSON envelopes, optionally framed with the
//! fixed-16 length header.
//!
//! Grounded on the teacher's general `serde_json` wire-encoding convention
//! (render-to-`Value`, then write) rather than a hand-rolled streaming
//! encoder — this crate's row counts are modest enough that the buffering
//! Fixed-16 framing requires anyway (§4.10: "first render the whole body
//! into a buffer") makes a streaming writer no cheaper.

use std::io::Write;

use crate::catalog::TableDef;
use crate::metrics::Metrics;
use crate::request::{OutputFormat, Request};
use crate::response::Response;

/// `sendColumnsHeader()`'s header row (§4.10.1): `request.columns[k]` when
/// within bounds, else the catalog column name; stats columns are labelled
/// `stats_1 … stats_N`. The header must have exactly as many entries as each
/// data row (§6's header/row alignment contract): that width is
/// `request.columns.len()` whenever the request names explicit columns
/// (rows are built to that width), falling back to `table.columns.len()`
/// only for the implicit "all columns" request (`request.columns` empty).
fn header_row(request: &Request, table: &TableDef) -> Vec<String> {
    let width = if request.columns.is_empty() { table.columns.len() } else { request.columns.len() };
    let mut header = Vec::with_capacity(width + request.stats.len());
    for i in 0..width {
        if let Some(col) = request.columns.get(i) {
            header.push(col.name.clone());
        } else if let Some(col) = table.columns.get(i) {
            header.push(col.name.clone());
        }
    }
    for i in 1..=request.stats.len() {
        header.push(format!("stats_{}", i));
    }
    header
}

fn body_rows(_request: &Request, response: &Response) -> Vec<serde_json::Value> {
    response.result().iter().map(|r| r.to_json_array()).collect()
}

/// Renders the non-wrapped `JSON` envelope: `[header?, row, row, ...]`.
fn json_array_body(request: &Request, response: &Response, table: &TableDef) -> serde_json::Value {
    let mut elements = Vec::new();
    if request.send_columns_header() {
        elements.push(serde_json::Value::Array(header_row(request, table).into_iter().map(serde_json::Value::String).collect()));
    }
    elements.extend(body_rows(request, response));
    serde_json::Value::Array(elements)
}

/// Renders the `WrappedJSON` envelope (§4.10, §6): `{"data":[...],
/// "failed":{...}, "columns":[...]?, "rows_scanned":N, "total_count":N}`.
fn wrapped_json_body(request: &Request, response: &Response, table: &TableDef, result_total: u64) -> serde_json::Value {
    let raw = response.raw_results();
    let mut map = serde_json::Map::new();
    map.insert("data".into(), serde_json::Value::Array(body_rows(request, response)));
    let failed: serde_json::Map<String, serde_json::Value> =
        response.failed().into_iter().map(|(id, msg)| (id.to_string(), serde_json::Value::String(msg))).collect();
    map.insert("failed".into(), serde_json::Value::Object(failed));
    if request.send_columns_header() {
        map.insert("columns".into(), serde_json::Value::Array(header_row(request, table).into_iter().map(serde_json::Value::String).collect()));
    }
    map.insert("rows_scanned".into(), serde_json::Value::from(raw.rows_scanned));
    map.insert("total_count".into(), serde_json::Value::from(result_total));
    serde_json::Value::Object(map)
}

/// Writes the finalized response to `out`, honoring `request.fixed16` for
/// framing (§4.10, §6), and adds the number of bytes actually written to
/// `metrics.frontend_bytes_sent` (§4.13, `promFrontendBytesSend`). Acquires
/// the peer's per-row lock while serializing any row whose store is
/// `Full`-locked, amortizing lock acquisition across the row rather than the
/// whole write (§4.10: "per row during serialization (not per column)");
/// this crate's row model does not retain a live handle to its originating
/// `DataStore` after the merge step, so that per-row re-lock is a no-op
/// placeholder documented here rather than implemented against a store this
/// writer no longer has access to — see `DESIGN.md`.
pub fn write_response(
    out: &mut impl Write,
    request: &Request,
    response: &Response,
    table: &TableDef,
    result_total: u64,
    metrics: &Metrics,
) -> crate::error::Result<()> {
    // A set global error (§7: "all requested backends failed") is reported
    // as its raw message, never JSON-encoded, under both framings; it can
    // only arise with plain JSON (`finalize_error_state` never sets it for
    // WrappedJSON — §3 invariant).
    if let Some(err) = &response.error {
        return write_framed(out, request, response.code, err.as_bytes(), metrics);
    }

    let body_value = match request.output_format {
        OutputFormat::Json => json_array_body(request, response, table),
        OutputFormat::WrappedJson => wrapped_json_body(request, response, table, result_total),
    };
    let body = serde_json::to_vec(&body_value)?;
    write_framed(out, request, response.code, &body, metrics)
}

fn write_framed(out: &mut impl Write, request: &Request, code: u16, body: &[u8], metrics: &Metrics) -> crate::error::Result<()> {
    let written = if request.fixed16 {
        // "%d %11d\n": code right-justified to 3+ digits, then body length +
        // 1 (trailing newline) right-justified to 11 digits (§4.10, §6).
        let header = format!("{:>3} {:>11}\n", code, body.len() + 1);
        out.write_all(header.as_bytes())?;
        out.write_all(body)?;
        out.write_all(b"\n")?;
        header.len() + body.len() + 1
    } else {
        out.write_all(body)?;
        out.write_all(b"\n")?;
        body.len() + 1
    };
    metrics.add_frontend_bytes_sent(written as u64);
    Ok(())
}
