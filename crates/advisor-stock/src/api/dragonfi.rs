//! DragonFi Securities REST client
//!
//! Primary source for the PSE symbol directory, stock profiles, valuation
//! multiples, annual financial statements and news.

use super::http::RateLimitedClient;
use super::{
    Capability, FinancialTrends, MarketDataSource, NewsItem, StockProfile, ValuationMultiples,
    de_opt_f64, value_as_f64,
};
use crate::cache::{CacheKey, ResponseCache};
use crate::domain::Symbol;
use crate::error::{Result, StockError};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

const SOURCE: &str = "dragonfi";

const CAPABILITIES: &[Capability] = &[
    Capability::Lookup,
    Capability::Profile,
    Capability::Valuation,
    Capability::FinancialTrends,
    Capability::News,
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileEntry {
    stock_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProfile {
    stock_code: Option<String>,
    company_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    prev_day_close_price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    week_high52: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    week_low52: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    dividend_yield: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    shares_outstanding: Option<f64>,
    #[serde(default, rename = "isREIT")]
    is_reit: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawValuation {
    #[serde(default)]
    annual_valuation: Option<AnnualValuation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnualValuation {
    price_to_earnings: Option<CurrentValue>,
    price_to_book: Option<CurrentValue>,
    #[serde(rename = "pegRatio")]
    peg: Option<CurrentValue>,
    forward_price_to_earnings: Option<CurrentValue>,
}

#[derive(Debug, Default, Deserialize)]
struct CurrentValue {
    #[serde(rename = "Current", default, deserialize_with = "de_opt_f64")]
    current: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NewsPayload {
    Wrapped { news: Vec<RawNews> },
    Bare(Vec<RawNews>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNews {
    title: Option<String>,
    headline: Option<String>,
    source: Option<String>,
    publish_date: Option<String>,
}

/// DragonFi API client
pub struct DragonFiClient {
    http: RateLimitedClient,
    base_url: String,
    directory: ResponseCache<Arc<BTreeSet<String>>>,
    profiles: ResponseCache<StockProfile>,
}

impl DragonFiClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        requests_per_minute: u32,
        directory_ttl: Duration,
        profile_ttl: Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: RateLimitedClient::new(SOURCE, timeout, requests_per_minute)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            directory: ResponseCache::new(directory_ttl),
            profiles: ResponseCache::new(profile_ttl),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// All listed common-stock codes
    #[instrument(skip(self))]
    pub async fn stock_codes(&self) -> Result<Option<Arc<BTreeSet<String>>>> {
        self.directory
            .get_or_try_fetch(CacheKey::new(SOURCE, "directory", ""), || async {
                let entries: Option<Vec<ProfileEntry>> = self
                    .http
                    .get_json(
                        &self.url("Securities/GetStockProfileList"),
                        &[("isPreferredStock", "false".to_string())],
                        HeaderMap::new(),
                    )
                    .await?;

                let codes: BTreeSet<String> = entries
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|e| e.stock_code)
                    .map(|code| code.trim().to_uppercase())
                    .filter(|code| !code.is_empty())
                    .collect();

                if codes.is_empty() {
                    return Ok(None);
                }
                tracing::info!(count = codes.len(), "loaded PSE stock codes");
                Ok::<_, StockError>(Some(Arc::new(codes)))
            })
            .await
    }

    async fn raw_profile(&self, symbol: &Symbol) -> Result<Option<RawProfile>> {
        self.http
            .get_json(
                &self.url("Securities/GetStockProfile"),
                &[("stockCode", symbol.to_string())],
                HeaderMap::new(),
            )
            .await
    }
}

#[async_trait]
impl MarketDataSource for DragonFiClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    #[instrument(skip(self), fields(source = SOURCE))]
    async fn lookup_symbol(&self, symbol: &Symbol) -> Result<Option<Symbol>> {
        let listed = self.stock_codes().await?;
        if listed.is_some_and(|codes| codes.contains(symbol.as_str())) {
            return Ok(Some(symbol.clone()));
        }

        // Preferred shares and fresh listings are missing from the directory
        let profile = self.raw_profile(symbol).await?;
        Ok(profile
            .and_then(|p| p.stock_code)
            .and_then(|code| Symbol::parse(&code).ok()))
    }

    #[instrument(skip(self), fields(source = SOURCE))]
    async fn profile(&self, symbol: &Symbol) -> Result<Option<StockProfile>> {
        self.profiles
            .get_or_try_fetch(CacheKey::new(SOURCE, "profile", symbol.as_str()), || async {
                let raw = self.raw_profile(symbol).await?;
                Ok::<_, StockError>(raw.and_then(|raw| to_profile(symbol, raw)))
            })
            .await
    }

    #[instrument(skip(self), fields(source = SOURCE))]
    async fn valuation(&self, symbol: &Symbol) -> Result<Option<ValuationMultiples>> {
        let raw: Option<RawValuation> = self
            .http
            .get_json(
                &self.url("Securities/GetSecurityValuation"),
                &[("stockCode", symbol.to_string())],
                HeaderMap::new(),
            )
            .await?;

        let Some(annual) = raw.and_then(|r| r.annual_valuation) else {
            return Ok(None);
        };

        let current = |v: Option<CurrentValue>| v.and_then(|c| c.current).filter(|x| *x != 0.0);
        let multiples = ValuationMultiples {
            pe_ratio: current(annual.price_to_earnings),
            pb_ratio: current(annual.price_to_book),
            peg_ratio: current(annual.peg),
            forward_pe: current(annual.forward_price_to_earnings),
            eps: None,
            book_value_per_share: None,
        };

        if multiples.pe_ratio.is_none() && multiples.pb_ratio.is_none() {
            return Ok(None);
        }
        Ok(Some(multiples))
    }

    #[instrument(skip(self), fields(source = SOURCE))]
    async fn financial_trends(&self, symbol: &Symbol) -> Result<Option<FinancialTrends>> {
        let raw: Option<Value> = self
            .http
            .get_json(
                &self.url("Securities/GetStockFinancialStatements"),
                &[("stockCode", symbol.to_string())],
                HeaderMap::new(),
            )
            .await?;

        let trends = raw.map(|value| parse_financial_trends(&value)).unwrap_or_default();
        Ok((!trends.is_empty()).then_some(trends))
    }

    #[instrument(skip(self), fields(source = SOURCE))]
    async fn news(&self, symbol: &Symbol, limit: usize) -> Result<Option<Vec<NewsItem>>> {
        let payload: Option<NewsPayload> = self
            .http
            .get_json(
                &self.url("News/GetNews"),
                &[
                    ("PageNum", "1".to_string()),
                    ("PageSize", limit.to_string()),
                    ("isShowPortfolioNews", "false".to_string()),
                    ("StockCode", symbol.to_string()),
                    ("SortBy", "PublishDate".to_string()),
                    ("Asc", "false".to_string()),
                ],
                HeaderMap::new(),
            )
            .await?;

        let raw = match payload {
            Some(NewsPayload::Wrapped { news } | NewsPayload::Bare(news)) => news,
            None => return Ok(None),
        };

        let items: Vec<NewsItem> = raw
            .into_iter()
            .filter_map(|n| {
                let title = n.title.or(n.headline)?.trim().to_string();
                (!title.is_empty()).then_some(NewsItem {
                    title,
                    source: n.source,
                    published: n.publish_date,
                })
            })
            .take(limit)
            .collect();

        Ok((!items.is_empty()).then_some(items))
    }
}

fn to_profile(symbol: &Symbol, raw: RawProfile) -> Option<StockProfile> {
    let price = raw.price.filter(|p| *p > 0.0)?;
    let positive = |v: Option<f64>| v.filter(|x| *x > 0.0);

    Some(StockProfile {
        symbol: raw
            .stock_code
            .map_or_else(|| symbol.to_string(), |c| c.trim().to_uppercase()),
        company_name: raw.company_name,
        price,
        previous_close: positive(raw.prev_day_close_price),
        week_high_52: positive(raw.week_high52),
        week_low_52: positive(raw.week_low52),
        dividend_yield_pct: positive(raw.dividend_yield),
        shares_outstanding: positive(raw.shares_outstanding),
        is_reit: raw.is_reit.unwrap_or(false),
        currency: "PHP".to_string(),
    })
}

const YEAR_KEYS: &[&str] = &["year", "fiscalYear", "fiscal_year", "period", "Year"];
const NET_INCOME_KEYS: &[&str] = &["netIncome", "NetIncome", "net_income", "netIncomeToCommon"];
const REVENUE_KEYS: &[&str] = &["revenue", "Revenue", "totalRevenue", "revenues"];
const FCF_KEYS: &[&str] = &["freeCashFlow", "FreeCashFlow", "free_cash_flow", "fcf"];

/// Walk a statements payload and collect per-year series
///
/// The statements endpoint nests yearly rows under different keys depending
/// on the statement type, so every array of objects carrying a year is
/// inspected for the fields we care about.
fn parse_financial_trends(value: &Value) -> FinancialTrends {
    let mut trends = FinancialTrends::default();
    collect_rows(value, &mut trends);
    trends
}

fn collect_rows(value: &Value, trends: &mut FinancialTrends) {
    match value {
        Value::Array(items) => {
            for item in items {
                if let Some(row) = item.as_object() {
                    if let Some(year) = row_year(row) {
                        insert_first(row, NET_INCOME_KEYS, year, &mut trends.net_income);
                        insert_first(row, REVENUE_KEYS, year, &mut trends.revenue);
                        insert_first(row, FCF_KEYS, year, &mut trends.free_cash_flow);
                    }
                }
                collect_rows(item, trends);
            }
        }
        Value::Object(map) => {
            for child in map.values() {
                collect_rows(child, trends);
            }
        }
        _ => {}
    }
}

fn row_year(row: &serde_json::Map<String, Value>) -> Option<i32> {
    YEAR_KEYS.iter().find_map(|key| {
        let raw = row.get(*key)?;
        let text = match raw {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            _ => return None,
        };
        // "2023", "FY2023", "2023-12-31"
        let digits: String = text
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take(4)
            .collect();
        digits.parse::<i32>().ok().filter(|y| (1900..=2200).contains(y))
    })
}

fn insert_first(
    row: &serde_json::Map<String, Value>,
    keys: &[&str],
    year: i32,
    series: &mut BTreeMap<i32, f64>,
) {
    if let Some(v) = keys.iter().find_map(|k| row.get(*k).and_then(value_as_f64)) {
        series.entry(year).or_insert(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_mapping() {
        let raw: RawProfile = serde_json::from_value(json!({
            "stockCode": "areit",
            "companyName": "AREIT, Inc.",
            "price": "42.10",
            "prevDayClosePrice": 41.5,
            "weekHigh52": 43.0,
            "weekLow52": 33.0,
            "dividendYield": 5.54,
            "sharesOutstanding": 0,
            "isREIT": true
        }))
        .unwrap();

        let symbol = Symbol::parse("AREIT").unwrap();
        let profile = to_profile(&symbol, raw).unwrap();
        assert_eq!(profile.symbol, "AREIT");
        assert_eq!(profile.price, 42.10);
        assert_eq!(profile.dividend_yield_pct, Some(5.54));
        assert_eq!(profile.shares_outstanding, None);
        assert!(profile.is_reit);
    }

    #[test]
    fn test_profile_without_price_is_no_data() {
        let raw: RawProfile = serde_json::from_value(json!({"stockCode": "XYZ", "price": 0})).unwrap();
        assert!(to_profile(&Symbol::parse("XYZ").unwrap(), raw).is_none());
    }

    #[test]
    fn test_valuation_payload_shape() {
        let raw: RawValuation = serde_json::from_value(json!({
            "annualValuation": {
                "priceToEarnings": {"Current": 10.0},
                "priceToBook": {"Current": "2.0"}
            }
        }))
        .unwrap();
        let annual = raw.annual_valuation.unwrap();
        assert_eq!(annual.price_to_earnings.unwrap().current, Some(10.0));
        assert_eq!(annual.price_to_book.unwrap().current, Some(2.0));
    }

    #[test]
    fn test_parse_financial_trends_nested() {
        let payload = json!({
            "incomeStatement": {
                "annual": [
                    {"year": 2021, "netIncome": 26.0e9, "revenue": 190.0e9},
                    {"year": "2022", "netIncome": "28.5e9", "revenue": 195.0e9},
                    {"fiscalYear": "FY2023", "netIncome": 30.1e9}
                ]
            },
            "cashFlow": [
                {"year": 2023, "freeCashFlow": 12.0e9},
                {"note": "no year here", "freeCashFlow": 1.0}
            ]
        });

        let trends = parse_financial_trends(&payload);
        assert_eq!(trends.net_income.len(), 3);
        assert_eq!(trends.net_income[&2023], 30.1e9);
        assert_eq!(trends.revenue.len(), 2);
        assert_eq!(trends.free_cash_flow, BTreeMap::from([(2023, 12.0e9)]));
    }

    #[test]
    fn test_news_payload_variants() {
        let wrapped: NewsPayload =
            serde_json::from_value(json!({"news": [{"title": "A", "source": "Inquirer"}]})).unwrap();
        assert!(matches!(wrapped, NewsPayload::Wrapped { news } if news.len() == 1));

        let bare: NewsPayload = serde_json::from_value(json!([{"headline": "B"}])).unwrap();
        assert!(matches!(bare, NewsPayload::Bare(news) if news[0].headline.as_deref() == Some("B")));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_lookup() {
        let client = DragonFiClient::new(
            crate::config::DEFAULT_DRAGONFI_BASE_URL,
            Duration::from_secs(15),
            60,
            Duration::from_secs(3600),
            Duration::from_secs(60),
        )
        .unwrap();
        let found = client.lookup_symbol(&Symbol::parse("TEL").unwrap()).await.unwrap();
        assert_eq!(found.map(|s| s.to_string()), Some("TEL".to_string()));
    }
}
