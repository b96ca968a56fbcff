//! Core vocabulary shared by every stage: tickers, analysis dimensions and verdicts

use crate::error::{Result, StockError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static SYMBOL_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[A-Z0-9]{1,8}(\.[A-Z0-9]{1,4})?$").expect("symbol pattern is valid")
});

/// Exchange suffix used by Yahoo Finance for PSE listings
pub const PSE_SUFFIX: &str = ".PS";

/// A normalized PSE ticker such as `TEL` or `AREIT`
///
/// Construction goes through [`Symbol::parse`], so a `Symbol` is always
/// upper-case, trimmed and free of the `.PS` suffix. That it actually trades
/// on the exchange is only known after validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Normalize user input into a ticker
    pub fn parse(raw: &str) -> Result<Self> {
        let upper = raw.trim().to_uppercase();
        let code = upper.strip_suffix(PSE_SUFFIX).unwrap_or(&upper);

        if code.is_empty() {
            return Err(StockError::InvalidSymbol("ticker is empty".to_string()));
        }
        if !SYMBOL_PATTERN.is_match(code) {
            return Err(StockError::InvalidSymbol(format!(
                "'{}' is not a valid PSE ticker",
                raw.trim()
            )));
        }

        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Ticker as Yahoo Finance lists it (`TEL.PS`)
    pub fn yahoo_ticker(&self) -> String {
        format!("{}{PSE_SUFFIX}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// One of the five independent analysis areas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Price,
    Dividend,
    Movement,
    Valuation,
    Controversy,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Price,
        Dimension::Dividend,
        Dimension::Movement,
        Dimension::Valuation,
        Dimension::Controversy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Dividend => "dividend",
            Self::Movement => "movement",
            Self::Valuation => "valuation",
            Self::Controversy => "controversy",
        }
    }

    /// Section heading used in prompts and rendered reports
    pub fn title(&self) -> &'static str {
        match self {
            Self::Price => "Price Analysis",
            Self::Dividend => "Dividend Analysis",
            Self::Movement => "Price Movement Analysis",
            Self::Valuation => "Valuation Analysis",
            Self::Controversy => "Controversy / Risk Analysis",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StockError::Other(format!("unknown dimension '{s}'")))
    }
}

/// Final investment verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "NOT BUY")]
    NotBuy,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::NotBuy => "NOT BUY",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        match collapsed.as_str() {
            "BUY" => Ok(Self::Buy),
            "NOT BUY" | "NOT_BUY" => Ok(Self::NotBuy),
            _ => Err(StockError::Other(format!("unknown verdict '{s}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_normalization() {
        assert_eq!(Symbol::parse("  tel ").unwrap().as_str(), "TEL");
        assert_eq!(Symbol::parse("areit.ps").unwrap().as_str(), "AREIT");
        assert_eq!(Symbol::parse("2GO").unwrap().as_str(), "2GO");
        assert_eq!(Symbol::parse("pnb.pr").unwrap().as_str(), "PNB.PR");
    }

    #[test]
    fn test_symbol_rejects_garbage() {
        assert!(matches!(Symbol::parse("   "), Err(StockError::InvalidSymbol(_))));
        assert!(Symbol::parse(".PS").is_err());
        assert!(Symbol::parse("TEL; DROP TABLE").is_err());
        assert!(Symbol::parse("WAYTOOLONGTICKER").is_err());
    }

    #[test]
    fn test_yahoo_ticker() {
        assert_eq!(Symbol::parse("sm").unwrap().yahoo_ticker(), "SM.PS");
    }

    #[test]
    fn test_dimension_round_trip_names() {
        for dimension in Dimension::ALL {
            assert_eq!(dimension.as_str().parse::<Dimension>().unwrap(), dimension);
        }
        assert_eq!(
            serde_json::to_string(&Dimension::Controversy).unwrap(),
            "\"controversy\""
        );
    }

    #[test]
    fn test_verdict_wire_format() {
        assert_eq!(serde_json::to_string(&Verdict::NotBuy).unwrap(), "\"NOT BUY\"");
        assert_eq!("not   buy".parse::<Verdict>().unwrap(), Verdict::NotBuy);
        assert_eq!("BUY".parse::<Verdict>().unwrap(), Verdict::Buy);
        assert!("HOLD".parse::<Verdict>().is_err());
    }
}
