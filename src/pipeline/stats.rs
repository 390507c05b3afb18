//! C6 Stats Aggregator (`spec.md` §4.6). Runs instead of the Local Scan
//! Engine whenever the request carries `stats` expressions.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::catalog::ColumnStorageKind;
use crate::request::{Filter, Request, RequestedColumn};
use crate::response::{ResultSetStats, StatsAccumulator};
use crate::row::StatsOperand;
use crate::store::{DataStore, LockMode};
use crate::value::ValueKind;

/// `request.columns` in stats mode names only the leading group-by columns
/// (§4.6: "joining the string values of each request column"); a stats
/// spec's own predicate or operand column (e.g. the `state` in `Counter:
/// state = 0`) may reference a column outside that list. Build the combined
/// schema — group columns first, then any additional columns a stats spec
/// touches, in first-appearance order — that matches the row layout the
/// store actually holds.
fn build_schema(request: &Request) -> Vec<RequestedColumn> {
    let mut schema = request.columns.clone();
    let push_if_new = |schema: &mut Vec<RequestedColumn>, name: &str| {
        if !schema.iter().any(|c| c.name == name) {
            schema.push(RequestedColumn {
                name: name.to_string(),
                storage_kind: ColumnStorageKind::Backend,
                value_kind: ValueKind::Float,
            });
        }
    };
    for spec in &request.stats {
        if let Some(col) = &spec.column {
            push_if_new(&mut schema, col);
        }
        let mut referenced = Vec::new();
        collect_referenced_columns(&spec.predicate, &mut referenced);
        for name in referenced {
            push_if_new(&mut schema, &name);
        }
    }
    schema
}

fn collect_referenced_columns(filter: &Filter, out: &mut Vec<String>) {
    match filter {
        Filter::None => {}
        Filter::Predicate(p) => {
            if !out.contains(&p.column) {
                out.push(p.column.clone());
            }
        }
        Filter::And(children) | Filter::Or(children) => {
            for child in children {
                collect_referenced_columns(child, out);
            }
        }
        Filter::Not(inner) => collect_referenced_columns(inner, out),
    }
}

/// Scans a store, grouping matching rows by the `\x1F`-joined values of
/// `request.columns` and folding each into that group's accumulators. Counts
/// with `request.counting_stats()` (`statsGrouped` if present, else
/// `stats`), which §4.6 defines as a list positionally aligned with
/// `request.stats` — each `request.stats[i]`'s accumulator is counted using
/// `counting_stats()[i]`, not looked up by `(kind, column)`, since two specs
/// can legitimately share that shape (e.g. two `Counter`s with different
/// predicates and no column). Cancellation semantics mirror the scan engine
/// (§4.5 step 4): every `row_context_check` rows, abandon and return `None`
/// on cancel.
pub fn aggregate_store(
    store: &DataStore,
    request: &Request,
    cancelled: &AtomicBool,
    row_context_check: u64,
    group_key_separator: char,
) -> Option<ResultSetStats> {
    let _row_guard = if store.lock_mode == LockMode::Full { Some(store.lock_row()) } else { None };

    let schema = build_schema(request);
    let stats_specs = request.counting_stats();
    let template: Vec<StatsAccumulator> = request.stats.iter().map(|s| StatsAccumulator::zero(s.kind)).collect();

    let mut out = ResultSetStats::default();

    for row in store.get_pre_filtered_data() {
        out.rows_scanned += 1;
        if row_context_check > 0 && out.rows_scanned % row_context_check == 0 && cancelled.load(Ordering::Relaxed) {
            return None;
        }

        if !row.match_filter(&request.filter, &schema, false) {
            continue;
        }
        if !row.check_auth(request.auth_user.as_deref()) {
            continue;
        }
        out.total += 1;

        let key = row.get_stats_key(request.columns.len(), group_key_separator);
        let group = out.group_mut(&key, &template);
        for (i, (acc, spec)) in group.iter_mut().zip(request.stats.iter()).enumerate() {
            let counting_spec = stats_specs.get(i).unwrap_or(spec);
            match row.stats_operand(counting_spec, &schema) {
                StatsOperand::Matched(true) => acc.apply_value(1.0, 1),
                StatsOperand::Matched(false) => {}
                StatsOperand::Numeric(v) => acc.apply_value(v, 1),
            }
        }
    }

    Some(out)
}
