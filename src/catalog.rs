//! Table/column catalog collaborator (`spec.md` §6's `Objects.Tables[name]`).
//!
//! Population of the catalog is external (`spec.md` §1 Non-goals: "the
//! metadata catalog"); [`StaticCatalog`] exists only so the pipeline is
//! runnable and testable in this crate without a real catalog service.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::value::ValueKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnStorageKind,
    pub value_kind: ValueKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColumnStorageKind {
    Backend,
    Virtual,
}

/// A table's catalog entry, per `spec.md` §6: `{virtual, passthroughOnly,
/// worksUnlocked, name}`, plus its column registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub virtual_table: bool,
    pub passthrough_only: bool,
    pub works_unlocked: bool,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// External catalog collaborator interface.
pub trait Catalog: Send + Sync {
    fn table(&self, name: &str) -> Option<TableDef>;
}

/// In-memory catalog used by tests and the demo binary.
#[derive(Clone, Default)]
pub struct StaticCatalog {
    tables: Arc<RwLock<HashMap<String, TableDef>>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, table: TableDef) -> Self {
        self.tables.write().insert(table.name.clone(), table);
        self
    }
}

impl Catalog for StaticCatalog {
    fn table(&self, name: &str) -> Option<TableDef> {
        self.tables.read().get(name).cloned()
    }
}
