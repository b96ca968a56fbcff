//! PSE EDGE client for daily OHLCV history
//!
//! History needs two identifiers: the company id from the autocomplete
//! endpoint and the security id of the common shares, scraped from the
//! company's stock data page. Both are cached per symbol.

use super::http::RateLimitedClient;
use super::{Candle, Capability, MarketDataSource, de_opt_f64};
use crate::cache::{CacheKey, ResponseCache};
use crate::domain::Symbol;
use crate::error::{Result, StockError};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::instrument;

const SOURCE: &str = "pse_edge";

const CAPABILITIES: &[Capability] = &[Capability::Lookup, Capability::DailyHistory];

const CHART_DATE_FORMAT: &str = "%b %d, %Y %H:%M:%S";

static SECURITY_ID_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r#"(?s)<select\s+name="security_id"[^>]*>.*?<option\s+value="(\d+)""#)
        .expect("security id pattern is valid")
});

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutocompleteEntry {
    symbol: Option<String>,
    cmpy_id: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EdgeIds {
    company_id: String,
    security_id: String,
}

#[derive(Debug, Serialize)]
struct ChartRequest<'a> {
    cmpy_id: &'a str,
    security_id: &'a str,
    #[serde(rename = "startDate")]
    start_date: String,
    #[serde(rename = "endDate")]
    end_date: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChartResponse {
    #[serde(rename = "chartData", default)]
    chart_data: Vec<ChartRow>,
}

#[derive(Debug, Deserialize)]
struct ChartRow {
    #[serde(rename = "CHART_DATE")]
    chart_date: Option<String>,
    #[serde(rename = "OPEN", default, deserialize_with = "de_opt_f64")]
    open: Option<f64>,
    #[serde(rename = "HIGH", default, deserialize_with = "de_opt_f64")]
    high: Option<f64>,
    #[serde(rename = "LOW", default, deserialize_with = "de_opt_f64")]
    low: Option<f64>,
    #[serde(rename = "CLOSE", default, deserialize_with = "de_opt_f64")]
    close: Option<f64>,
    /// Traded value in PHP, which the chart uses as volume
    #[serde(rename = "VALUE", default, deserialize_with = "de_opt_f64")]
    value: Option<f64>,
}

/// PSE EDGE client
pub struct PseEdgeClient {
    http: RateLimitedClient,
    base_url: String,
    company_ids: ResponseCache<String>,
    security_ids: ResponseCache<String>,
}

impl PseEdgeClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        requests_per_minute: u32,
    ) -> Result<Self> {
        // Listings do not move between ids, a day is plenty
        let ttl = Duration::from_secs(24 * 3600);
        Ok(Self {
            http: RateLimitedClient::new(SOURCE, timeout, requests_per_minute)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            company_ids: ResponseCache::new(ttl),
            security_ids: ResponseCache::new(ttl),
        })
    }

    fn xhr_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        headers
    }

    async fn company_id(&self, symbol: &Symbol) -> Result<Option<String>> {
        self.company_ids
            .get_or_try_fetch(CacheKey::new(SOURCE, "company_id", symbol.as_str()), || async {
                let entries: Option<Vec<AutocompleteEntry>> = self
                    .http
                    .get_json(
                        &format!("{}/autoComplete/searchCompanyNameSymbol.ax", self.base_url),
                        &[("term", symbol.to_string())],
                        Self::xhr_headers(),
                    )
                    .await?;
                Ok::<_, StockError>(match_company_id(symbol, &entries.unwrap_or_default()))
            })
            .await
    }

    async fn security_id(&self, symbol: &Symbol, company_id: &str) -> Result<Option<String>> {
        self.security_ids
            .get_or_try_fetch(CacheKey::new(SOURCE, "security_id", symbol.as_str()), || async {
                let page = self
                    .http
                    .get_text(
                        &format!("{}/companyPage/stockData.do", self.base_url),
                        &[("cmpy_id", company_id.to_string())],
                    )
                    .await?;
                Ok::<_, StockError>(page.as_deref().and_then(extract_security_id))
            })
            .await
    }

    async fn resolve_ids(&self, symbol: &Symbol) -> Result<Option<EdgeIds>> {
        let Some(company_id) = self.company_id(symbol).await? else {
            tracing::debug!(%symbol, "no PSE EDGE company id");
            return Ok(None);
        };
        let Some(security_id) = self.security_id(symbol, &company_id).await? else {
            tracing::debug!(%symbol, %company_id, "no PSE EDGE security id");
            return Ok(None);
        };
        Ok(Some(EdgeIds {
            company_id,
            security_id,
        }))
    }
}

#[async_trait]
impl MarketDataSource for PseEdgeClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    #[instrument(skip(self), fields(source = SOURCE))]
    async fn lookup_symbol(&self, symbol: &Symbol) -> Result<Option<Symbol>> {
        Ok(self.company_id(symbol).await?.map(|_| symbol.clone()))
    }

    #[instrument(skip(self), fields(source = SOURCE))]
    async fn daily_history(&self, symbol: &Symbol, days: u32) -> Result<Option<Vec<Candle>>> {
        let Some(ids) = self.resolve_ids(symbol).await? else {
            return Ok(None);
        };

        let end = Utc::now().date_naive();
        let start = end - ChronoDuration::days(i64::from(days));
        let request = ChartRequest {
            cmpy_id: &ids.company_id,
            security_id: &ids.security_id,
            start_date: start.format("%m-%d-%Y").to_string(),
            end_date: end.format("%m-%d-%Y").to_string(),
        };

        let mut headers = Self::xhr_headers();
        let referer = format!(
            "{}/companyPage/stockData.do?cmpy_id={}",
            self.base_url, ids.company_id
        );
        if let Ok(value) = HeaderValue::from_str(&referer) {
            headers.insert(REFERER, value);
        }

        let response: Option<ChartResponse> = self
            .http
            .post_json(&format!("{}/common/DisclosureCht.ax", self.base_url), &request, headers)
            .await?;

        let candles = candles_from_rows(response.unwrap_or_default().chart_data);
        if candles.is_empty() {
            tracing::info!(%symbol, "PSE EDGE returned empty chart data");
            return Ok(None);
        }
        Ok(Some(candles))
    }
}

fn match_company_id(symbol: &Symbol, entries: &[AutocompleteEntry]) -> Option<String> {
    entries
        .iter()
        .find(|e| {
            e.symbol
                .as_deref()
                .is_some_and(|s| s.trim().eq_ignore_ascii_case(symbol.as_str()))
        })
        .and_then(|e| match e.cmpy_id.as_ref()? {
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
}

fn extract_security_id(html: &str) -> Option<String> {
    SECURITY_ID_PATTERN
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parse chart rows, dropping duplicate dates and unparseable rows
fn candles_from_rows(rows: Vec<ChartRow>) -> Vec<Candle> {
    let mut by_date: BTreeMap<NaiveDate, Candle> = BTreeMap::new();

    for row in rows {
        let Some(date) = row
            .chart_date
            .as_deref()
            .and_then(|d| NaiveDateTime::parse_from_str(d.trim(), CHART_DATE_FORMAT).ok())
            .map(|dt| dt.date())
        else {
            continue;
        };
        let Some(close) = row.close else {
            continue;
        };

        by_date.entry(date).or_insert(Candle {
            date,
            open: row.open.unwrap_or(close),
            high: row.high.unwrap_or(close),
            low: row.low.unwrap_or(close),
            close,
            volume: row.value.unwrap_or(0.0),
        });
    }

    by_date.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_match_company_id_exact_only() {
        let entries: Vec<AutocompleteEntry> = serde_json::from_value(json!([
            {"symbol": "TELX", "cmpyId": 1},
            {"symbol": "tel", "cmpyId": 6},
        ]))
        .unwrap();
        let symbol = Symbol::parse("TEL").unwrap();
        assert_eq!(match_company_id(&symbol, &entries), Some("6".to_string()));

        let missing = Symbol::parse("SM").unwrap();
        assert_eq!(match_company_id(&missing, &entries), None);
    }

    #[test]
    fn test_extract_security_id() {
        let html = r#"
            <form>
              <select name="security_id" id="security_id" onchange="x()">
                <option value="146" selected>TEL</option>
                <option value="500">TEL Preferred</option>
              </select>
            </form>"#;
        assert_eq!(extract_security_id(html), Some("146".to_string()));
        assert_eq!(extract_security_id("<html>no select</html>"), None);
    }

    #[test]
    fn test_candles_dedup_and_sort() {
        let response: ChartResponse = serde_json::from_value(json!({
            "chartData": [
                {"CHART_DATE": "Mar 05, 2024 00:00:00", "OPEN": 10, "HIGH": 11, "LOW": 9, "CLOSE": 10.5, "VALUE": 1000},
                {"CHART_DATE": "Mar 04, 2024 00:00:00", "OPEN": 9, "HIGH": 10, "LOW": 8.5, "CLOSE": 10, "VALUE": 800},
                {"CHART_DATE": "Mar 05, 2024 00:00:00", "OPEN": 99, "HIGH": 99, "LOW": 99, "CLOSE": 99, "VALUE": 1},
                {"CHART_DATE": "garbage", "CLOSE": 1}
            ]
        }))
        .unwrap();

        let candles = candles_from_rows(response.chart_data);
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(candles[1].close, 10.5);
        assert_eq!(candles[1].volume, 1000.0);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_history() {
        let client = PseEdgeClient::new(
            crate::config::DEFAULT_PSE_EDGE_BASE_URL,
            Duration::from_secs(15),
            30,
        )
        .unwrap();
        let history = client
            .daily_history(&Symbol::parse("TEL").unwrap(), 30)
            .await
            .unwrap();
        assert!(history.is_some_and(|h| !h.is_empty()));
    }
}
