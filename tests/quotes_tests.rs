#![cfg(feature = "web")]
use std::sync::Arc;
use std::time::Duration;

use mockito::Matcher;
use stock_viewer::Error;
use stock_viewer::market::Period;
use stock_viewer::quotes::{QuoteProvider, QuoteService, RetryPolicy, YahooChartProvider};

const DAY: i64 = 86_400;
// 2024-06-03 00:00:00 UTC
const START: i64 = 1_717_372_800;

fn chart_body(closes: &[Option<f64>]) -> String {
    let timestamps: Vec<i64> = (0..closes.len() as i64).map(|i| START + i * DAY).collect();
    serde_json::json!({
        "chart": {
            "result": [{
                "timestamp": timestamps,
                "indicators": { "quote": [{ "close": closes }] }
            }],
            "error": null
        }
    })
    .to_string()
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        initial_delay: Duration::from_millis(1),
    }
}

fn service(url: &str) -> QuoteService {
    let provider = YahooChartProvider::new(url).unwrap();
    QuoteService::new(Arc::new(provider), Duration::from_secs(60), fast_retry())
}

#[tokio::test]
async fn parses_closes_and_drops_nulls() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v8/finance/chart/KO")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("range".into(), "1mo".into()),
            Matcher::UrlEncoded("interval".into(), "1d".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chart_body(&[Some(60.0), None, Some(61.5)]))
        .create_async()
        .await;

    let provider = YahooChartProvider::new(&server.url()).unwrap();
    let series = provider.history("KO", Period::OneMonth).await.unwrap();

    mock.assert_async().await;
    assert_eq!(series.ticker, "KO");
    assert_eq!(series.closes(), vec![60.0, 61.5]);
    assert_eq!(series.points[0].date.to_string(), "2024-06-03");
    assert_eq!(series.points[1].date.to_string(), "2024-06-05");
}

#[tokio::test]
async fn rate_limit_is_retried_then_reported() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v8/finance/chart/KO")
        .match_query(Matcher::Any)
        .with_status(429)
        .expect(3)
        .create_async()
        .await;

    let err = service(&server.url())
        .series("KO", Period::OneYear)
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, Error::RateLimited { ref ticker } if ticker == "KO"));
}

#[tokio::test]
async fn other_failures_are_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v8/finance/chart/KO")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("boom")
        .expect(1)
        .create_async()
        .await;

    let err = service(&server.url())
        .series("KO", Period::OneYear)
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, Error::Provider(_)));
}

#[tokio::test]
async fn series_are_cached_per_period() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v8/finance/chart/KO")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(chart_body(&[Some(1.0), Some(2.0)]))
        .expect(2)
        .create_async()
        .await;

    let quotes = service(&server.url());
    let first = quotes.series("KO", Period::OneYear).await.unwrap();
    let second = quotes.series("KO", Period::OneYear).await.unwrap();
    quotes.series("KO", Period::FiveDays).await.unwrap();

    mock.assert_async().await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn fetch_many_skips_tickers_without_data() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v8/finance/chart/KO")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(chart_body(&[Some(60.0)]))
        .create_async()
        .await;
    server
        .mock("GET", "/v8/finance/chart/NOPE")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    let batch = service(&server.url())
        .fetch_many(&["KO".to_string(), "NOPE".to_string()], Period::OneYear)
        .await;

    assert_eq!(batch.series.len(), 1);
    assert_eq!(batch.series[0].ticker, "KO");
    assert_eq!(batch.skipped.len(), 1);
    assert_eq!(batch.skipped[0].ticker, "NOPE");
    assert_eq!(batch.skipped[0].reason, "No data for NOPE");
}

#[tokio::test]
async fn volatility_uses_one_year_history() {
    let mut server = mockito::Server::new_async().await;
    let closes: Vec<Option<f64>> = (1..=30).map(|i| Some(i as f64)).collect();
    server
        .mock("GET", "/v8/finance/chart/KO")
        .match_query(Matcher::UrlEncoded("range".into(), "1y".into()))
        .with_status(200)
        .with_body(chart_body(&closes))
        .create_async()
        .await;

    let v = service(&server.url()).volatility("KO").await.unwrap();

    // latest 30, week reference 25, month reference 10, year reference 1
    assert_eq!(v.weekly_change_value, Some(5.0));
    assert_eq!(v.weekly_change_percent, Some(20.0));
    assert_eq!(v.monthly_change_value, Some(20.0));
    assert_eq!(v.monthly_change_percent, Some(200.0));
    assert_eq!(v.yearly_change_value, Some(29.0));
    assert_eq!(v.yearly_change_percent, Some(2900.0));
}
