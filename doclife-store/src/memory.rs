// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use doclife_core::Row;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::traits::Transaction;

#[derive(Clone, Debug, Default)]
pub(crate) struct Tables {
    /// Rows per doctype, addressed by their name.
    pub(crate) rows: HashMap<String, BTreeMap<String, Row>>,

    /// Rows of single doctypes.
    pub(crate) singles: HashMap<String, Row>,

    /// Current value of every naming series.
    pub(crate) series: HashMap<String, u64>,
}

/// In-memory store.
///
/// This does not persist data permamently, all changes are lost when the process ends. Use this
/// only in development or test contexts.
///
/// Transactions are serialized with a single permit, just like a database which only allows one
/// writing transaction at a time. Beginning a transaction takes a snapshot of all tables which is
/// restored on rollback.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    snapshot: Arc<Mutex<Option<Tables>>>,
    semaphore: Arc<Semaphore>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::default(),
            snapshot: Arc::default(),
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    pub(crate) fn read_tables(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables
            .read()
            .expect("acquire shared read access on store")
    }

    pub(crate) fn write_tables(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables
            .write()
            .expect("acquire exclusive write access on store")
    }

    /// Returns `true` if a transaction is currently running.
    pub fn in_transaction(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Permit held while a transaction is running.
///
/// A permit dropped without commit or rollback rolls its transaction back.
#[derive(Debug)]
pub struct TransactionPermit {
    tables: Arc<RwLock<Tables>>,
    snapshot: Arc<Mutex<Option<Tables>>>,
    _permit: OwnedSemaphorePermit,
}

impl TransactionPermit {
    fn take_snapshot(&self) -> Option<Tables> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn restore(&self, snapshot: Tables) {
        *self.tables.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}

impl Drop for TransactionPermit {
    fn drop(&mut self) {
        if let Some(snapshot) = self.take_snapshot() {
            self.restore(snapshot);
        }
    }
}

impl Transaction for MemoryStore {
    type Error = Infallible;

    type Permit = TransactionPermit;

    async fn begin(&self) -> Result<TransactionPermit, Infallible> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("if semaphore is closed then the whole struct is gone as well");

        let snapshot = self.read_tables().clone();
        let mut snapshot_ref = self.snapshot.lock().expect("acquire lock on snapshot");
        assert!(
            snapshot_ref.is_none(),
            "can't have an already existing transaction after an just-acquired permit"
        );
        snapshot_ref.replace(snapshot);

        Ok(TransactionPermit {
            tables: self.tables.clone(),
            snapshot: self.snapshot.clone(),
            _permit: permit,
        })
    }

    async fn rollback(&self, permit: TransactionPermit) -> Result<(), Infallible> {
        let Some(snapshot) = permit.take_snapshot() else {
            panic!("can't have no transaction without dropping permit first")
        };
        permit.restore(snapshot);
        Ok(())
    }

    async fn commit(&self, permit: TransactionPermit) -> Result<(), Infallible> {
        if permit.take_snapshot().is_none() {
            panic!("can't have no transaction without dropping permit first")
        }
        Ok(())
    }
}

// Row access is implemented in the `rows` module.
