//! Report persistence
//!
//! [`ReportRepository`] is the only way reports reach storage. Two backends
//! exist: [`MemoryReportRepository`] for tests and throwaway runs, and
//! [`SqliteReportRepository`] for anything that should survive a restart.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryReportRepository;
pub use sqlite::SqliteReportRepository;

use crate::config::StorageBackend;
use crate::domain::{Symbol, Verdict};
use crate::engine::report::FinalReport;
use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub type ReportId = i64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredReport {
    pub id: ReportId,
    pub report: FinalReport,
}

/// Latest verdict for a symbol, as listed by `list_recent_symbols`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentSymbol {
    pub symbol: Symbol,
    pub verdict: Verdict,
    pub generated_at: DateTime<Utc>,
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn save(&self, report: &FinalReport) -> Result<ReportId, StorageError>;

    async fn get_latest(&self, symbol: &Symbol) -> Result<Option<StoredReport>, StorageError>;

    /// `None` when the id does not exist or belongs to another symbol
    async fn get_by_id(
        &self,
        symbol: &Symbol,
        id: ReportId,
    ) -> Result<Option<StoredReport>, StorageError>;

    /// Newest first
    async fn list_history(
        &self,
        symbol: &Symbol,
        limit: usize,
    ) -> Result<Vec<StoredReport>, StorageError>;

    /// Distinct symbols by most recent report, newest first
    async fn list_recent_symbols(&self, limit: usize) -> Result<Vec<RecentSymbol>, StorageError>;
}

/// One async mutex per symbol
///
/// Saves for the same symbol queue up; different symbols proceed
/// independently.
#[derive(Debug, Default)]
pub struct SymbolLocks {
    locks: DashMap<Symbol, Arc<Mutex<()>>>,
}

impl SymbolLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, symbol: &Symbol) -> OwnedMutexGuard<()> {
        // clone out of the shard before awaiting
        let lock = Arc::clone(self.locks.entry(symbol.clone()).or_default().value());
        lock.lock_owned().await
    }
}

/// Repository for the configured backend
pub fn open_repository(
    backend: StorageBackend,
    sqlite_path: &Path,
) -> Result<Arc<dyn ReportRepository>, StorageError> {
    match backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryReportRepository::new())),
        StorageBackend::Sqlite => Ok(Arc::new(SqliteReportRepository::open(sqlite_path)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_symbol_waits() {
        let locks = Arc::new(SymbolLocks::new());
        let tel = Symbol::parse("TEL").unwrap();

        let guard = locks.lock(&tel).await;
        let waiter = {
            let locks = Arc::clone(&locks);
            let tel = tel.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&tel).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_symbols_do_not_block() {
        let locks = SymbolLocks::new();
        let _tel = locks.lock(&Symbol::parse("TEL").unwrap()).await;
        let sm_symbol = Symbol::parse("SM").unwrap();
        let sm = tokio::time::timeout(Duration::from_millis(100), locks.lock(&sm_symbol)).await;
        assert!(sm.is_ok());
    }

    #[test]
    fn test_open_memory_backend() {
        assert!(open_repository(StorageBackend::Memory, Path::new("unused.db")).is_ok());
    }
}
