//! In-memory report repository

use super::{RecentSymbol, ReportId, ReportRepository, StoredReport};
use crate::domain::Symbol;
use crate::engine::report::FinalReport;
use crate::error::StorageError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// Reports grouped per symbol; the shard lock serializes writes per symbol
#[derive(Debug)]
pub struct MemoryReportRepository {
    reports: DashMap<Symbol, Vec<StoredReport>>,
    next_id: AtomicI64,
}

impl Default for MemoryReportRepository {
    fn default() -> Self {
        Self {
            reports: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl MemoryReportRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reports.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReportRepository for MemoryReportRepository {
    async fn save(&self, report: &FinalReport) -> Result<ReportId, StorageError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.reports
            .entry(report.symbol.clone())
            .or_default()
            .push(StoredReport {
                id,
                report: report.clone(),
            });
        tracing::debug!(symbol = %report.symbol, id, "report stored in memory");
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
        Ok(self
            .reports
            .get(symbol)
            .and_then(|entry| entry.value().iter().find(|r| r.id == id).cloned()))
    }

    async fn list_history(
        &self,
        symbol: &Symbol,
        limit: usize,
    ) -> Result<Vec<StoredReport>, StorageError> {
        let Some(entry) = self.reports.get(symbol) else {
            return Ok(Vec::new());
        };
        let mut history = entry.value().clone();
        history.sort_by(|a, b| {
            b.report
                .generated_at
                .cmp(&a.report.generated_at)
                .then(b.id.cmp(&a.id))
        });
        history.truncate(limit);
        Ok(history)
    }

    async fn list_recent_symbols(&self, limit: usize) -> Result<Vec<RecentSymbol>, StorageError> {
        let mut recent: Vec<RecentSymbol> = self
            .reports
            .iter()
            .filter_map(|entry| {
                entry
                    .value()
                    .iter()
                    .max_by(|a, b| {
                        a.report
                            .generated_at
                            .cmp(&b.report.generated_at)
                            .then(a.id.cmp(&b.id))
                    })
                    .map(|latest| RecentSymbol {
                        symbol: entry.key().clone(),
                        verdict: latest.report.verdict,
                        generated_at: latest.report.generated_at,
                    })
            })
            .collect();
        recent.sort_by(|a, b| {
            b.generated_at
                .cmp(&a.generated_at)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        recent.truncate(limit);
        Ok(recent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Verdict;
    use crate::engine::report::VerdictBasis;
    use chrono::{Duration, Utc};
    use std::collections::BTreeMap;

    fn report(symbol: &str, verdict: Verdict, minutes_ago: i64) -> FinalReport {
        FinalReport {
            symbol: Symbol::parse(symbol).unwrap(),
            verdict,
            summary: format!("{symbol} summary"),
            sections: BTreeMap::new(),
            limitations: Vec::new(),
            verdict_basis: VerdictBasis::Reasoning,
            generated_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let repo = MemoryReportRepository::new();
        let old = repo.save(&report("TEL", Verdict::NotBuy, 60)).await.unwrap();
        let new = repo.save(&report("TEL", Verdict::Buy, 1)).await.unwrap();
        repo.save(&report("SM", Verdict::Buy, 0)).await.unwrap();

        let tel = Symbol::parse("TEL").unwrap();
        let history = repo.list_history(&tel, 10).await.unwrap();
        assert_eq!(history.iter().map(|r| r.id).collect::<Vec<_>>(), vec![new, old]);
        assert_eq!(repo.get_latest(&tel).await.unwrap().unwrap().report.verdict, Verdict::Buy);
        assert_eq!(repo.len(), 3);
    }

    #[tokio::test]
    async fn test_get_by_id_is_scoped_to_symbol() {
        let repo = MemoryReportRepository::new();
        let id = repo.save(&report("TEL", Verdict::Buy, 0)).await.unwrap();

        assert!(repo.get_by_id(&Symbol::parse("TEL").unwrap(), id).await.unwrap().is_some());
        assert!(repo.get_by_id(&Symbol::parse("SM").unwrap(), id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recent_symbols() {
        let repo = MemoryReportRepository::new();
        repo.save(&report("TEL", Verdict::NotBuy, 30)).await.unwrap();
        repo.save(&report("SM", Verdict::Buy, 10)).await.unwrap();
        repo.save(&report("TEL", Verdict::Buy, 5)).await.unwrap();

        let recent = repo.list_recent_symbols(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].symbol.as_str(), "TEL");
        assert_eq!(recent[0].verdict, Verdict::Buy);
        assert_eq!(recent[1].symbol.as_str(), "SM");

        assert_eq!(repo.list_recent_symbols(1).await.unwrap().len(), 1);
    }
}
