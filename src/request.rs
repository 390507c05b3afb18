//! The frozen query request (`spec.md` §3). Parsing (lexing the Livestatus
//! grammar) is an external collaborator; this module is the parsed shape
//! the core consumes, guaranteed well-formed per `spec.md` §6.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::catalog::ColumnStorageKind;
use crate::peer::PeerId;
use crate::value::{DataValue, ValueKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    WrappedJson,
}

/// A requested column: `spec.md` §3's "ordered list of requested column
/// descriptors, each with a storage kind".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestedColumn {
    pub name: String,
    pub storage_kind: ColumnStorageKind,
    pub value_kind: ValueKind,
}

/// A single comparison predicate, e.g. `state = 0`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub op: CompareOp,
    pub value: DataValue,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Filter tree. `spec.md` §4.5 only requires AND across *top-level*
/// predicates with `negate=false`; nested `And`/`Or`/`Not` are supported so
/// a parser-supplied tree of arbitrary shape matches correctly, but the top
/// level of `Request::filter` is expected to be (possibly an `And` of)
/// simple predicates per the component design.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Filter {
    Predicate(Predicate),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// No filter at all: matches every row.
    None,
}

impl Default for Filter {
    fn default() -> Self {
        Filter::None
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StatsKind {
    Counter,
    Min,
    Max,
    Sum,
    Average,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsSpec {
    pub kind: StatsKind,
    /// Counter/Sum/Min/Max/Average column or predicate operand; for
    /// `Counter` this is the predicate to count matches of, for the
    /// numeric kinds it's the column to project.
    pub predicate: Filter,
    pub column: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SortField {
    pub column_index: usize,
    pub direction: Direction,
    /// Marks this field as a sort over the stats group key (`spec.md`
    /// §4.9.1: "group=true" ⇒ string compare on the key itself).
    pub group: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaitTrigger {
    pub condition: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub table: String,
    pub columns: Vec<RequestedColumn>,
    pub filter: Filter,
    pub stats: Vec<StatsSpec>,
    pub stats_grouped: Option<Vec<StatsSpec>>,
    pub sort: Vec<SortField>,
    pub limit: Option<usize>,
    pub offset: usize,
    /// Empty = all backends.
    pub backends: HashSet<PeerId>,
    pub wait_trigger: Option<WaitTrigger>,
    pub output_format: OutputFormat,
    pub fixed16: bool,
    pub columns_header: Option<bool>,
    pub auth_user: Option<String>,
    pub send_stats_data: bool,
}

impl Request {
    pub fn has_stats(&self) -> bool {
        !self.stats.is_empty()
    }

    /// `spec.md` §4.10.1: explicit header request OR implicit "all
    /// columns" (no column list supplied); false whenever stats present.
    pub fn send_columns_header(&self) -> bool {
        if self.has_stats() {
            return false;
        }
        self.columns_header.unwrap_or(self.columns.is_empty())
    }

    /// The predicate set used for counting (`spec.md` §4.6): `statsGrouped`
    /// if present, else `stats`.
    pub fn counting_stats(&self) -> &[StatsSpec] {
        self.stats_grouped.as_deref().unwrap_or(&self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> Request {
        Request {
            table: "hosts".into(),
            columns: vec![],
            filter: Filter::None,
            stats: vec![],
            stats_grouped: None,
            sort: vec![],
            limit: None,
            offset: 0,
            backends: HashSet::new(),
            wait_trigger: None,
            output_format: OutputFormat::Json,
            fixed16: false,
            columns_header: None,
            auth_user: None,
            send_stats_data: false,
        }
    }

    #[test]
    fn header_implicit_when_no_columns() {
        assert!(base_request().send_columns_header());
    }

    #[test]
    fn header_false_with_stats() {
        let mut r = base_request();
        r.stats.push(StatsSpec { kind: StatsKind::Counter, predicate: Filter::None, column: None });
        assert!(!r.send_columns_header());
    }

    #[test]
    fn counting_stats_prefers_grouped() {
        let mut r = base_request();
        let s1 = StatsSpec { kind: StatsKind::Counter, predicate: Filter::None, column: None };
        r.stats = vec![s1.clone()];
        assert_eq!(r.counting_stats(), &[s1.clone()]);
        r.stats_grouped = Some(vec![]);
        assert_eq!(r.counting_stats(), &[] as &[StatsSpec]);
    }
}
