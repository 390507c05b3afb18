//! `DataRow` (`spec.md` §3): a tuple of column values plus the per-row
//! operations the Local Scan Engine and Stats Aggregator call.

use serde_json::Value as Json;

use crate::request::{CompareOp, Filter, Predicate, RequestedColumn, StatsKind, StatsSpec};
use crate::value::DataValue;

/// A single row, addressed by column index within whatever column list the
/// store was populated with. Access-control predicate *evaluation rules*
/// are an external collaborator (`spec.md` §1 Non-goals); this crate
/// implements the common Livestatus contact-membership check as the
/// concrete rule, since `checkAuth` must do *something* to be testable.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    values: Vec<DataValue>,
    /// Contact names allowed to see this row; `None` means unrestricted.
    auth_contacts: Option<Vec<String>>,
}

impl DataRow {
    pub fn new(values: Vec<DataValue>) -> Self {
        Self { values, auth_contacts: None }
    }

    pub fn with_auth_contacts(mut self, contacts: Vec<String>) -> Self {
        self.auth_contacts = Some(contacts);
        self
    }

    pub fn get_value_by_column(&self, index: usize) -> Option<&DataValue> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn check_auth(&self, auth_user: Option<&str>) -> bool {
        match (&self.auth_contacts, auth_user) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(contacts), Some(user)) => contacts.iter().any(|c| c == user),
        }
    }

    /// Evaluates `filter` against this row (`requestColumns` maps predicate
    /// column names to indices). `negate` flips the final boolean, matching
    /// `DataRow.matchFilter(f, negate)`'s signature in `spec.md` §3.
    pub fn match_filter(&self, filter: &Filter, columns: &[RequestedColumn], negate: bool) -> bool {
        let result = self.eval_filter(filter, columns);
        if negate { !result } else { result }
    }

    fn eval_filter(&self, filter: &Filter, columns: &[RequestedColumn]) -> bool {
        match filter {
            Filter::None => true,
            Filter::Predicate(p) => self.eval_predicate(p, columns),
            Filter::And(children) => children.iter().all(|c| self.eval_filter(c, columns)),
            Filter::Or(children) => children.iter().any(|c| self.eval_filter(c, columns)),
            Filter::Not(inner) => !self.eval_filter(inner, columns),
        }
    }

    fn eval_predicate(&self, predicate: &Predicate, columns: &[RequestedColumn]) -> bool {
        let Some(index) = columns.iter().position(|c| c.name == predicate.column) else {
            return false;
        };
        let Some(actual) = self.get_value_by_column(index) else {
            return false;
        };
        compare_values(actual, predicate.op, &predicate.value)
    }

    /// `getStatsKey(req)` (`spec.md` §4.6): joins the string values of each
    /// request column with the group-key separator.
    pub fn get_stats_key(&self, num_group_columns: usize, separator: char) -> String {
        self.values
            .iter()
            .take(num_group_columns)
            .map(DataValue::as_group_key_part)
            .collect::<Vec<_>>()
            .join(&separator.to_string())
    }

    /// `countStats(statsSpec, accumState)` projection helper: resolves the
    /// numeric operand for Sum/Min/Max/Average, or evaluates the counting
    /// predicate for Counter. Column lookup uses `columns` the same way
    /// `match_filter` does.
    pub fn stats_operand(&self, spec: &StatsSpec, columns: &[RequestedColumn]) -> StatsOperand {
        match spec.kind {
            StatsKind::Counter => StatsOperand::Matched(self.eval_filter(&spec.predicate, columns)),
            StatsKind::Min | StatsKind::Max | StatsKind::Sum | StatsKind::Average => {
                let value = spec
                    .column
                    .as_ref()
                    .and_then(|name| columns.iter().position(|c| c.name == *name))
                    .and_then(|idx| self.get_value_by_column(idx))
                    .map(DataValue::as_f64_lossy)
                    .unwrap_or(0.0);
                StatsOperand::Numeric(value)
            }
        }
    }

    /// `writeJSON(stream, requestedColumns)`: renders this row as a JSON
    /// array aligned with `requested_columns` (by count, not by name — the
    /// caller is responsible for having populated `values` in request
    /// order).
    pub fn to_json_array(&self) -> Json {
        Json::Array(self.values.iter().map(DataValue::to_json).collect())
    }
}

pub enum StatsOperand {
    Matched(bool),
    Numeric(f64),
}

fn compare_values(actual: &DataValue, op: CompareOp, expected: &DataValue) -> bool {
    use std::cmp::Ordering::*;
    let ord = match (actual, expected) {
        (DataValue::String(a), DataValue::String(b)) => Some(a.cmp(b)),
        _ => actual.as_f64_lossy().partial_cmp(&expected.as_f64_lossy()),
    };
    match op {
        CompareOp::Eq => actual == expected,
        CompareOp::Ne => actual != expected,
        CompareOp::Lt => ord == Some(Less),
        CompareOp::Le => matches!(ord, Some(Less) | Some(Equal)),
        CompareOp::Gt => ord == Some(Greater),
        CompareOp::Ge => matches!(ord, Some(Greater) | Some(Equal)),
    }
}
