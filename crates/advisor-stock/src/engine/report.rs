//! The consolidated report handed back to callers

use crate::domain::{Dimension, Symbol, Verdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the verdict was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictBasis {
    /// Read from the consolidation narrative
    Reasoning,
    /// Rule-based count of specialist signals
    Signals,
}

impl VerdictBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reasoning => "reasoning",
            Self::Signals => "signals",
        }
    }
}

impl std::str::FromStr for VerdictBasis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reasoning" => Ok(Self::Reasoning),
            "signals" => Ok(Self::Signals),
            other => Err(format!("unknown verdict basis '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub symbol: Symbol,
    pub verdict: Verdict,
    /// Consolidated narrative, or the templated fallback summary
    pub summary: String,
    /// Narrative per successfully analysed dimension
    pub sections: BTreeMap<Dimension, String>,
    /// One note per dimension that could not be analysed
    pub limitations: Vec<String>,
    pub verdict_basis: VerdictBasis,
    pub generated_at: DateTime<Utc>,
}

impl FinalReport {
    pub fn section(&self, dimension: Dimension) -> Option<&str> {
        self.sections.get(&dimension).map(String::as_str)
    }

    pub fn missing_dimensions(&self) -> Vec<Dimension> {
        Dimension::ALL
            .into_iter()
            .filter(|d| !self.sections.contains_key(d))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_dimensions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dimensions() {
        let report = FinalReport {
            symbol: Symbol::parse("TEL").unwrap(),
            verdict: Verdict::NotBuy,
            summary: "Summary".to_string(),
            sections: [
                (Dimension::Price, "p".to_string()),
                (Dimension::Valuation, "v".to_string()),
            ]
            .into_iter()
            .collect(),
            limitations: Vec::new(),
            verdict_basis: VerdictBasis::Reasoning,
            generated_at: Utc::now(),
        };

        assert_eq!(report.section(Dimension::Price), Some("p"));
        assert_eq!(
            report.missing_dimensions(),
            vec![Dimension::Dividend, Dimension::Movement, Dimension::Controversy]
        );
        assert!(!report.is_complete());
    }

    #[test]
    fn test_verdict_basis_round_trip() {
        assert_eq!("signals".parse::<VerdictBasis>(), Ok(VerdictBasis::Signals));
        assert!("vibes".parse::<VerdictBasis>().is_err());
    }
}
