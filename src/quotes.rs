#![cfg(feature = "web")]
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::market::{Period, PricePoint, StockSeries, Volatility};

/// Tickers shown on the US page when the user has not saved a list
pub const DEFAULT_US_TICKERS: [&str; 6] = ["VT", "VTI", "VEA", "VWO", "KO", "TSM"];

/// Source of historical daily closes.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn history(&self, ticker: &str, period: Period) -> Result<StockSeries>;
}

/// Yahoo Finance chart API client.
pub struct YahooChartProvider {
    client: Client,
    base_url: String,
}

impl YahooChartProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("stock-viewer/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[async_trait]
impl QuoteProvider for YahooChartProvider {
    async fn history(&self, ticker: &str, period: Period) -> Result<StockSeries> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);
        let response = self
            .client
            .get(&url)
            .query(&[("range", period.as_str()), ("interval", "1d")])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited {
                ticker: ticker.to_string(),
            });
        }
        // An unknown symbol comes back as 404 with an empty result.
        if status == StatusCode::NOT_FOUND {
            return Ok(StockSeries {
                ticker: ticker.to_string(),
                points: Vec::new(),
            });
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return Err(Error::Provider(format!("{}: {}", status, body)));
        }

        let envelope = response.json::<ChartEnvelope>().await?;
        if let Some(err) = envelope.chart.error {
            return Err(Error::Provider(
                err.description.unwrap_or_else(|| "chart API error".to_string()),
            ));
        }

        let points = envelope
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .map(into_points)
            .unwrap_or_default();

        Ok(StockSeries {
            ticker: ticker.to_string(),
            points,
        })
    }
}

fn into_points(result: ChartResult) -> Vec<PricePoint> {
    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    result
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let close = close?;
            let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
            Some(PricePoint { date, close })
        })
        .collect()
}

/// Retries rate-limited calls with a doubling delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            initial_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Runs `op` until it succeeds, fails with something other than a rate
    /// limit, or the attempts are used up.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut delay = self.initial_delay;
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Err(Error::RateLimited { ticker }) if attempt < attempts => {
                    log::warn!(
                        "rate limited on {} (attempt {}/{}), retrying in {:?}",
                        ticker,
                        attempt,
                        attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// In-memory cache of fetched series keyed by ticker and period.
pub struct QuoteCache {
    ttl: Duration,
    entries: Mutex<HashMap<(String, Period), (Instant, StockSeries)>>,
}

impl QuoteCache {
    pub fn new(ttl: Duration) -> Self {
        QuoteCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, ticker: &str, period: Period) -> Option<StockSeries> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&(ticker.to_string(), period))
            .filter(|(at, _)| at.elapsed() < self.ttl)
            .map(|(_, s)| s.clone())
    }

    pub fn put(&self, ticker: &str, period: Period, series: StockSeries) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, (at, _)| at.elapsed() < self.ttl);
        entries.insert((ticker.to_string(), period), (Instant::now(), series));
    }
}

/// Series fetched for several tickers at once
#[derive(Debug, Clone, Default, Serialize)]
pub struct QuoteBatch {
    pub series: Vec<StockSeries>,

    /// Tickers left out, with the reason
    pub skipped: Vec<SkippedTicker>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedTicker {
    pub ticker: String,
    pub reason: String,
}

/// Provider access with caching and retries.
pub struct QuoteService {
    provider: Arc<dyn QuoteProvider>,
    cache: QuoteCache,
    retry: RetryPolicy,
}

impl QuoteService {
    pub fn new(provider: Arc<dyn QuoteProvider>, cache_ttl: Duration, retry: RetryPolicy) -> Self {
        QuoteService {
            provider,
            cache: QuoteCache::new(cache_ttl),
            retry,
        }
    }

    /// Daily closes of one ticker; empty series are not cached.
    pub async fn series(&self, ticker: &str, period: Period) -> Result<StockSeries> {
        if let Some(hit) = self.cache.get(ticker, period) {
            log::debug!("quote cache hit for {} {}", ticker, period);
            return Ok(hit);
        }

        let series = self
            .retry
            .run(|| self.provider.history(ticker, period))
            .await?;
        if !series.is_empty() {
            self.cache.put(ticker, period, series.clone());
        }
        Ok(series)
    }

    /// Fetches each ticker in turn; failures and empty series are skipped.
    pub async fn fetch_many(&self, tickers: &[String], period: Period) -> QuoteBatch {
        let mut batch = QuoteBatch::default();
        for ticker in tickers {
            match self.series(ticker, period).await {
                Ok(series) if series.is_empty() => {
                    log::warn!("no data for {}, skipping", ticker);
                    batch.skipped.push(SkippedTicker {
                        ticker: ticker.clone(),
                        reason: format!("No data for {}", ticker),
                    });
                }
                Ok(series) => batch.series.push(series),
                Err(e) => {
                    log::error!("error retrieving data for {}: {}", ticker, e);
                    batch.skipped.push(SkippedTicker {
                        ticker: ticker.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        batch
    }

    /// Week, month and year changes from one year of closes.
    pub async fn volatility(&self, ticker: &str) -> Result<Volatility> {
        let series = self.series(ticker, Period::OneYear).await?;
        Ok(Volatility::from_closes(&series.closes()))
    }
}
