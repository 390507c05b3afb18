//! C5 Local Scan Engine (`spec.md` §4.5).

use std::sync::atomic::{AtomicBool, Ordering};

use crate::request::{OutputFormat, Request};
use crate::response::PeerResponse;
use crate::store::{DataStore, LockMode};

/// `optimizeResultLimit(request)` (§4.5 step 2): when the result will not be
/// re-sorted after merging, the scanner itself can stop counting once
/// `offset + limit` matches are found. Any sort forces unbounded counting so
/// the merged result can still be ordered correctly before truncation.
fn optimize_result_limit(request: &Request) -> Option<usize> {
    if request.sort.is_empty() {
        request.limit.map(|limit| request.offset + limit)
    } else {
        None
    }
}

/// Scans one store's prefiltered candidates, applying the top-level filter
/// and auth check, and returns the matching rows up to the optimized limit.
/// `cancelled` is polled every `row_context_check` rows (§4.5 step 4, §5); a
/// cancelled scan returns `None` rather than a partial sub-result.
pub fn scan_store(
    store: &DataStore,
    request: &Request,
    cancelled: &AtomicBool,
    row_context_check: u64,
) -> Option<PeerResponse> {
    let _row_guard = if store.lock_mode == LockMode::Full { Some(store.lock_row()) } else { None };

    let limit_prime = optimize_result_limit(request);
    let early_exit = !matches!(request.output_format, OutputFormat::WrappedJson);

    let mut total: u64 = 0;
    let mut rows_scanned: u64 = 0;
    let mut rows = Vec::new();

    for row in store.get_pre_filtered_data() {
        rows_scanned += 1;
        if row_context_check > 0 && rows_scanned % row_context_check == 0 && cancelled.load(Ordering::Relaxed) {
            return None;
        }

        if !row.match_filter(&request.filter, &request.columns, false) {
            continue;
        }
        if !row.check_auth(request.auth_user.as_deref()) {
            continue;
        }

        total += 1;
        match limit_prime {
            Some(limit) if total as usize > limit => {
                if early_exit {
                    break;
                }
                // WrappedJSON needs an accurate total_count; keep counting.
            }
            _ => rows.push(row.clone()),
        }
    }

    Some(PeerResponse { rows, total, rows_scanned })
}
