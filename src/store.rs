//! Per-peer in-memory table snapshots (`spec.md` §3). Peer/Store cyclic
//! references are replaced with arena-style indices per §9's design note:
//! a [`DataSet`] owns its [`DataStore`]s and the readers-writer lock;
//! stores do not hold a back-reference to their parent, only a [`StoreId`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{ArcRwLockReadGuard, RawRwLock, RwLock};

use crate::row::DataRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreId(pub usize);

/// `peerLockMode` (`spec.md` §3): orthogonal to the `DataSet` lock, handled
/// by scanners (§4.5) and the writer (§4.10) rather than the locker (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    None,
    Simple,
    Full,
}

/// One table's cached rows for one peer.
pub struct DataStore {
    pub id: StoreId,
    pub table: String,
    pub lock_mode: LockMode,
    rows: Vec<DataRow>,
    /// Per-row lock used only in `Full` mode (`spec.md` §4.5 step 1, §4.10).
    row_lock: parking_lot::Mutex<()>,
}

impl DataStore {
    pub fn new(id: StoreId, table: impl Into<String>, lock_mode: LockMode, rows: Vec<DataRow>) -> Self {
        Self {
            id,
            table: table.into(),
            lock_mode,
            rows,
            row_lock: parking_lot::Mutex::new(()),
        }
    }

    /// `GetPreFilteredData(filter)`: an index-assisted candidate set. This
    /// in-memory implementation has no secondary indices, so every row is a
    /// candidate; the filter is still applied by the scanner afterward.
    pub fn get_pre_filtered_data(&self) -> &[DataRow] {
        &self.rows
    }

    /// Acquire the per-row lock once for an entire `Full`-mode scan
    /// (`spec.md` §4.5 step 1) or once per row during write (§4.10).
    pub fn lock_row(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.row_lock.lock()
    }
}

/// Per-peer container of all its `DataStore`s plus the readers-writer lock
/// scanners hold as a reader unless the table's `worksUnlocked` is set
/// (`spec.md` §4.4, §5).
///
/// The lock itself lives behind its own `Arc` (rather than borrowed from
/// `&DataSet`) so a read guard can outlive the `lock_stores` call that
/// acquires it and travel with the scan task as an owned value, via
/// parking_lot's `arc_lock` guards — no lifetime gymnastics or `unsafe`
/// needed to hold a lock "from Store Locker entry to Response Writer
/// entry" (§3 Lifecycle) across an `async` boundary.
#[derive(Default)]
pub struct DataSet {
    lock: Arc<RwLock<()>>,
    stores: parking_lot::Mutex<HashMap<String, Arc<DataStore>>>,
}

pub type DataSetReadGuard = ArcRwLockReadGuard<RawRwLock, ()>;

impl DataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, store: Arc<DataStore>) {
        self.stores.lock().insert(store.table.clone(), store);
    }

    pub fn get(&self, table: &str) -> Option<Arc<DataStore>> {
        self.stores.lock().get(table).cloned()
    }

    /// Acquired by the Store Locker (§4.4) and held until the Response
    /// Writer begins (§3 Lifecycle), unless the table `worksUnlocked`.
    pub fn read_guard(&self) -> DataSetReadGuard {
        parking_lot::RwLock::read_arc(&self.lock)
    }
}
