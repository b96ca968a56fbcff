//! Shared fixtures for unit tests

use crate::agents::{DimensionResult, Finding, Signal};
use crate::api::{Capability, MockMarketDataSource, StockProfile, ValuationMultiples};
use crate::config::Thresholds;
use crate::data::{MarketData, controversy, dividend, movement, price, valuation};
use crate::domain::Dimension;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const LOOKUP: &[Capability] = &[Capability::Lookup];

/// Market data whose only source is a directory of `known` tickers
pub fn directory(known: &'static [&'static str]) -> MarketData {
    let mut source = MockMarketDataSource::new();
    source.expect_name().return_const("directory");
    source.expect_capabilities().return_const(LOOKUP);
    source
        .expect_lookup_symbol()
        .returning(move |s| Ok(known.iter().any(|k| *k == s.as_str()).then(|| s.clone())));
    MarketData::new(vec![Arc::new(source)], Duration::from_secs(1))
}

pub fn profile(symbol: &str) -> StockProfile {
    StockProfile {
        symbol: symbol.to_string(),
        company_name: Some(format!("{symbol} Corp")),
        price: 100.0,
        previous_close: Some(98.0),
        week_high_52: Some(120.0),
        week_low_52: Some(80.0),
        dividend_yield_pct: Some(4.0),
        shares_outstanding: Some(1_000_000.0),
        is_reit: false,
        currency: "PHP".to_string(),
    }
}

fn finding<T>(data: T, narrative: &str, signals: Vec<Signal>) -> Finding<T> {
    Finding {
        data,
        narrative: narrative.to_string(),
        signals,
    }
}

pub fn price_result(narrative: &str) -> DimensionResult {
    let data = price::price_from_profile(&profile("TEL"), &Thresholds::default());
    DimensionResult::Price(finding(data, narrative, Vec::new()))
}

pub fn price_result_with_signals(signals: Vec<Signal>) -> DimensionResult {
    let data = price::price_from_profile(&profile("TEL"), &Thresholds::default());
    DimensionResult::Price(finding(data, "Price narrative.", signals))
}

/// A plausible successful result for any dimension
pub fn result_for(dimension: Dimension) -> DimensionResult {
    let t = Thresholds::default();
    let p = profile("TEL");
    let narrative = format!("{} narrative.", dimension.title());

    match dimension {
        Dimension::Price => DimensionResult::Price(finding(
            price::price_from_profile(&p, &t),
            &narrative,
            vec![Signal::opportunity("near the bottom of its range")],
        )),
        Dimension::Dividend => DimensionResult::Dividend(finding(
            dividend::dividend_from_parts(&p, None, &t),
            &narrative,
            vec![Signal::opportunity("4.0% yield")],
        )),
        Dimension::Movement => DimensionResult::Movement(finding(
            movement::movement_from_range(&p, None, &t).unwrap(),
            &narrative,
            Vec::new(),
        )),
        Dimension::Valuation => {
            let multiples = ValuationMultiples {
                pe_ratio: Some(10.0),
                pb_ratio: Some(1.0),
                ..ValuationMultiples::default()
            };
            DimensionResult::Valuation(finding(
                valuation::valuation_from_parts("TEL", p.price, &multiples, None),
                &narrative,
                vec![Signal::opportunity("below fair value")],
            ))
        }
        Dimension::Controversy => DimensionResult::Controversy(finding(
            controversy::controversy_from_parts(
                "TEL",
                None,
                vec!["[BusinessWorld] TEL posts record income".to_string()],
                &t,
            ),
            &narrative,
            vec![Signal::risk("regulatory inquiry")],
        )),
    }
}

/// Base URL of a local server answering every request with `status_line`
/// and `body`
pub async fn serve_fixed(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    format!("http://{addr}")
}
