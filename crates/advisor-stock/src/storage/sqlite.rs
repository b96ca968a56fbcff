//! SQLite report repository

use super::{RecentSymbol, ReportId, ReportRepository, StoredReport, SymbolLocks};
use crate::domain::{Dimension, Symbol, Verdict};
use crate::engine::report::{FinalReport, VerdictBasis};
use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS reports (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol        TEXT NOT NULL,
    verdict       TEXT NOT NULL,
    summary       TEXT NOT NULL,
    sections      TEXT NOT NULL,
    limitations   TEXT NOT NULL,
    verdict_basis TEXT NOT NULL,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_reports_symbol_created ON reports (symbol, created_at DESC);
";

const SELECT_COLUMNS: &str =
    "SELECT id, symbol, verdict, summary, sections, limitations, verdict_basis, created_at FROM reports";

/// Columns as stored, decoded into a report outside the row callback
struct RawRow {
    id: i64,
    symbol: String,
    verdict: String,
    summary: String,
    sections: String,
    limitations: String,
    verdict_basis: String,
    created_at: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            symbol: row.get(1)?,
            verdict: row.get(2)?,
            summary: row.get(3)?,
            sections: row.get(4)?,
            limitations: row.get(5)?,
            verdict_basis: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn decode(self) -> Result<StoredReport, StorageError> {
        let id = self.id;
        let corrupt = |reason: String| StorageError::Corrupt { id, reason };

        let symbol = Symbol::parse(&self.symbol).map_err(|e| corrupt(e.to_string()))?;
        let verdict: Verdict = self
            .verdict
            .parse()
            .map_err(|e: crate::error::StockError| corrupt(e.to_string()))?;
        let verdict_basis: VerdictBasis = self.verdict_basis.parse().map_err(corrupt)?;
        let sections: BTreeMap<Dimension, String> = serde_json::from_str(&self.sections)?;
        let limitations: Vec<String> = serde_json::from_str(&self.limitations)?;
        let generated_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| corrupt(format!("bad timestamp '{}': {e}", self.created_at)))?
            .with_timezone(&Utc);

        Ok(StoredReport {
            id,
            report: FinalReport {
                symbol,
                verdict,
                summary: self.summary,
                sections,
                limitations,
                verdict_basis,
                generated_at,
            },
        })
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    // fixed width so text order matches time order
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Reports in a single SQLite database
///
/// Calls run on the blocking pool. Saves for one symbol are serialized
/// through [`SymbolLocks`].
#[derive(Clone)]
pub struct SqliteReportRepository {
    conn: Arc<Mutex<Connection>>,
    locks: Arc<SymbolLocks>,
}

impl SqliteReportRepository {
    /// Open (and create if needed) the database at `path`
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        tracing::info!(path = %path.display(), "opened report database");
        Self::initialize(conn)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            locks: Arc::new(SymbolLocks::new()),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| StorageError::TaskFailed(e.to_string()))?
    }

    async fn query_reports(
        &self,
        sql: String,
        symbol: String,
        extra: i64,
    ) -> Result<Vec<StoredReport>, StorageError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![symbol, extra], RawRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(RawRow::decode).collect()
        })
        .await
    }
}

#[async_trait]
impl ReportRepository for SqliteReportRepository {
    async fn save(&self, report: &FinalReport) -> Result<ReportId, StorageError> {
        let _guard = self.locks.lock(&report.symbol).await;

        let symbol = report.symbol.to_string();
        let verdict = report.verdict.as_str();
        let summary = report.summary.clone();
        let sections = serde_json::to_string(&report.sections)?;
        let limitations = serde_json::to_string(&report.limitations)?;
        let basis = report.verdict_basis.as_str();
        let created_at = timestamp(&report.generated_at);

        let id = self
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO reports (symbol, verdict, summary, sections, limitations, verdict_basis, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![symbol, verdict, summary, sections, limitations, basis, created_at],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        tracing::info!(symbol = %report.symbol, id, verdict = %report.verdict, "report saved");
        Ok(id)
    }

    async fn get_latest(&self, symbol: &Symbol) -> Result<Option<StoredReport>, StorageError> {
        Ok(self.list_history(symbol, 1).await?.into_iter().next())
    }

    async fn get_by_id(
        &self,
        symbol: &Symbol,
        id: ReportId,
    ) -> Result<Option<StoredReport>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE symbol = ?1 AND id = ?2");
        let symbol = symbol.to_string();
        let raw = self
            .with_conn(move |conn| {
                Ok(conn
                    .query_row(&sql, params![symbol, id], RawRow::from_row)
                    .optional()?)
            })
            .await?;
        raw.map(RawRow::decode).transpose()
    }

    async fn list_history(
        &self,
        symbol: &Symbol,
        limit: usize,
    ) -> Result<Vec<StoredReport>, StorageError> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE symbol = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2"
        );
        self.query_reports(sql, symbol.to_string(), limit_param(limit)).await
    }

    async fn list_recent_symbols(&self, limit: usize) -> Result<Vec<RecentSymbol>, StorageError> {
        let limit = limit_param(limit);
        let rows: Vec<(i64, String, String, String)> = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT r.id, r.symbol, r.verdict, r.created_at FROM reports r
                     WHERE r.id = (
                         SELECT id FROM reports WHERE symbol = r.symbol
                         ORDER BY created_at DESC, id DESC LIMIT 1
                     )
                     ORDER BY r.created_at DESC, r.symbol ASC
                     LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map(params![limit], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(id, symbol, verdict, created_at)| {
                let corrupt = |reason: String| StorageError::Corrupt { id, reason };
                Ok(RecentSymbol {
                    symbol: Symbol::parse(&symbol).map_err(|e| corrupt(e.to_string()))?,
                    verdict: verdict
                        .parse()
                        .map_err(|e: crate::error::StockError| corrupt(e.to_string()))?,
                    generated_at: DateTime::parse_from_rfc3339(&created_at)
                        .map_err(|e| corrupt(e.to_string()))?
                        .with_timezone(&Utc),
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for SqliteReportRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteReportRepository").finish_non_exhaustive()
    }
}
