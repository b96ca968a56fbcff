//! Symbol validation gate

use crate::data::{LookupOutcome, MarketData};
use crate::domain::Symbol;
use crate::error::WorkflowError;
use tracing::instrument;

/// Normalizes a raw ticker and confirms it is listed
///
/// Malformed input is rejected before any upstream call.
#[derive(Debug, Clone)]
pub struct SymbolValidator {
    data: MarketData,
}

impl SymbolValidator {
    pub fn new(data: MarketData) -> Self {
        Self { data }
    }

    #[instrument(skip(self))]
    pub async fn validate(&self, raw: &str) -> Result<Symbol, WorkflowError> {
        let symbol = Symbol::parse(raw).map_err(|e| WorkflowError::SymbolInvalid {
            symbol: raw.trim().to_string(),
            reason: e.to_string(),
        })?;

        match self.data.lookup_symbol(&symbol).await {
            LookupOutcome::Found(canonical) => {
                tracing::debug!(%canonical, "symbol validated");
                Ok(canonical)
            }
            LookupOutcome::NotFound => Err(WorkflowError::SymbolInvalid {
                symbol: symbol.to_string(),
                reason: "not listed on the Philippine Stock Exchange".to_string(),
            }),
            LookupOutcome::Unreachable(reason) => Err(WorkflowError::DataUnavailable {
                symbol: symbol.to_string(),
                reason,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Capability, DragonFiClient, MockMarketDataSource};
    use crate::error::StockError;
    use crate::test_support::{directory, serve_fixed};
    use std::sync::Arc;
    use std::time::Duration;

    const LOOKUP: &[Capability] = &[Capability::Lookup];

    #[tokio::test]
    async fn test_normalizes_and_accepts_listed_symbol() {
        let validator = SymbolValidator::new(directory(&["TEL"]));
        let symbol = validator.validate("  tel.ps ").await.unwrap();
        assert_eq!(symbol.as_str(), "TEL");
    }

    #[tokio::test]
    async fn test_unlisted_symbol_is_invalid() {
        let validator = SymbolValidator::new(directory(&["TEL"]));
        let err = validator.validate("ZZZZ").await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::SymbolInvalid { ref reason, .. } if reason.contains("not listed")
        ));
    }

    #[tokio::test]
    async fn test_malformed_symbol_never_hits_the_network() {
        let mut source = MockMarketDataSource::new();
        source.expect_name().return_const("directory");
        source.expect_capabilities().return_const(LOOKUP);
        source.expect_lookup_symbol().times(0);
        let validator = SymbolValidator::new(MarketData::new(
            vec![Arc::new(source)],
            Duration::from_secs(1),
        ));

        for raw in ["", "   ", "TEL$", "A B"] {
            let err = validator.validate(raw).await.unwrap_err();
            assert!(matches!(err, WorkflowError::SymbolInvalid { .. }), "{raw:?}");
        }
    }

    #[tokio::test]
    async fn test_unreachable_directory_is_data_unavailable() {
        let mut source = MockMarketDataSource::new();
        source.expect_name().return_const("directory");
        source.expect_capabilities().return_const(LOOKUP);
        source
            .expect_lookup_symbol()
            .returning(|_| Err(StockError::ApiError("503".to_string())));
        let validator = SymbolValidator::new(MarketData::new(
            vec![Arc::new(source)],
            Duration::from_secs(1),
        ));

        let err = validator.validate("TEL").await.unwrap_err();
        assert!(matches!(err, WorkflowError::DataUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_directory_outage_is_not_reported_as_bad_ticker() {
        let base = serve_fixed("503 Service Unavailable", "").await;
        let dragonfi = DragonFiClient::new(
            base,
            Duration::from_secs(3),
            600,
            Duration::from_secs(60),
            Duration::from_secs(60),
        )
        .unwrap();
        let validator = SymbolValidator::new(MarketData::new(
            vec![Arc::new(dragonfi)],
            Duration::from_secs(3),
        ));

        let err = validator.validate("TEL").await.unwrap_err();
        let WorkflowError::DataUnavailable { reason, .. } = &err else {
            panic!("expected DataUnavailable, got {err:?}");
        };
        assert!(reason.contains("503"), "{reason}");
    }
}
