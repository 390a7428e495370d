//! Store wrappers for observing and breaking the engine's store access

use std::sync::atomic::{AtomicUsize, Ordering};
use topicgraph::{GraphStore, GraphTxn, OpenStore, SqliteStore, StorageError, StorageResult};

/// Counts units of work opened against an in-memory SQLite store
pub struct CountingStore {
    inner: SqliteStore,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().expect("in-memory store"),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.reads() + self.writes()
    }
}

impl GraphStore for CountingStore {
    fn read(&self) -> StorageResult<Box<dyn GraphTxn + '_>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read()
    }

    fn write(&self) -> StorageResult<Box<dyn GraphTxn + '_>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write()
    }
}

/// Works until switched off, then fails every unit of work
pub struct FailingStore {
    inner: SqliteStore,
    failing: std::sync::atomic::AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().expect("in-memory store"),
            failing: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("store switched off".into()));
        }
        Ok(())
    }
}

impl GraphStore for FailingStore {
    fn read(&self) -> StorageResult<Box<dyn GraphTxn + '_>> {
        self.check()?;
        self.inner.read()
    }

    fn write(&self) -> StorageResult<Box<dyn GraphTxn + '_>> {
        self.check()?;
        self.inner.write()
    }
}
