use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Look-back window for historical prices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[default]
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "10y")]
    TenYears,
    #[serde(rename = "ytd")]
    YearToDate,
    #[serde(rename = "max")]
    Max,
}

impl Period {
    pub const ALL: [Period; 11] = [
        Period::OneDay,
        Period::FiveDays,
        Period::OneMonth,
        Period::ThreeMonths,
        Period::SixMonths,
        Period::OneYear,
        Period::TwoYears,
        Period::FiveYears,
        Period::TenYears,
        Period::YearToDate,
        Period::Max,
    ];

    /// Periods offered on the Japan stock page
    pub const JAPAN: [Period; 4] = [
        Period::OneYear,
        Period::TwoYears,
        Period::FiveYears,
        Period::TenYears,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::FiveDays => "5d",
            Period::OneMonth => "1mo",
            Period::ThreeMonths => "3mo",
            Period::SixMonths => "6mo",
            Period::OneYear => "1y",
            Period::TwoYears => "2y",
            Period::FiveYears => "5y",
            Period::TenYears => "10y",
            Period::YearToDate => "ytd",
            Period::Max => "max",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Period::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| Error::InvalidPeriod(s.to_string()))
    }
}

/// One daily closing price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Historical closing prices of one ticker, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSeries {
    pub ticker: String,
    pub points: Vec<PricePoint>,
}

impl StockSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    /// Name used when the series is offered as a download
    ///
    /// `{YYYYMMDD}_{ticker}_stockData.csv`, dropping a Tokyo `.T` suffix.
    pub fn download_file_name(&self, today: NaiveDate) -> String {
        let ticker = self.ticker.trim_end_matches(".T");
        format!("{}_{}_stockData.csv", today.format("%Y%m%d"), ticker)
    }

    /// `Date,Close` CSV of the series
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["Date", "Close"])?;
        for point in &self.points {
            writer.write_record([point.date.format("%Y-%m-%d").to_string(), point.close.to_string()])?;
        }
        writer
            .into_inner()
            .map_err(|e| Error::io("csv buffer", e.into_error()))
    }
}

/// Price changes over week, month and year
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Volatility {
    pub weekly_change_value: Option<f64>,
    pub weekly_change_percent: Option<f64>,
    pub monthly_change_value: Option<f64>,
    pub monthly_change_percent: Option<f64>,
    pub yearly_change_value: Option<f64>,
    pub yearly_change_percent: Option<f64>,
}

impl Volatility {
    /// Computes changes from a year of daily closes, oldest first
    ///
    /// The week reference is the 6th close from the end, the month reference
    /// the 21st, the year reference the first one. A reference that is
    /// missing or zero yields `None` for that window.
    pub fn from_closes(closes: &[f64]) -> Self {
        let Some(&latest) = closes.last() else {
            return Volatility::default();
        };
        let n = closes.len();
        let week_ago = (n > 6).then(|| closes[n - 6]);
        let month_ago = (n > 21).then(|| closes[n - 21]);
        let year_ago = (n > 1).then(|| closes[0]);

        Volatility {
            weekly_change_value: change(latest, week_ago),
            weekly_change_percent: change_percent(latest, week_ago),
            monthly_change_value: change(latest, month_ago),
            monthly_change_percent: change_percent(latest, month_ago),
            yearly_change_value: change(latest, year_ago),
            yearly_change_percent: change_percent(latest, year_ago),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn change(new: f64, old: Option<f64>) -> Option<f64> {
    old.filter(|o| *o != 0.0).map(|o| round2(new - o))
}

fn change_percent(new: f64, old: Option<f64>) -> Option<f64> {
    old.filter(|o| *o != 0.0).map(|o| round2((new - o) / o * 100.0))
}

/// Normalises a Tokyo Stock Exchange code typed by a user
///
/// Full-width characters become half-width, the code is upper-cased and the
/// `.T` market suffix is appended once.
///
/// # Examples
/// ```
/// use stock_viewer::market::normalize_jp_ticker;
///
/// assert_eq!(normalize_jp_ticker("７２０３"), "7203.T");
/// assert_eq!(normalize_jp_ticker("7203.t"), "7203.T");
/// ```
pub fn normalize_jp_ticker(input: &str) -> String {
    let half: String = input
        .chars()
        .map(|c| match c {
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            '\u{3000}' => ' ',
            other => other,
        })
        .collect();
    let code = half.trim().to_uppercase();
    if code.ends_with(".T") {
        code
    } else {
        format!("{}.T", code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_round_trips_through_str() {
        for p in Period::ALL {
            assert_eq!(p.as_str().parse::<Period>().unwrap(), p);
        }
        assert!("2w".parse::<Period>().is_err());
        assert_eq!(Period::default(), Period::OneYear);
    }

    #[test]
    fn volatility_windows() {
        let closes: Vec<f64> = (1..=30).map(|v| v as f64).collect();
        let v = Volatility::from_closes(&closes);
        // latest 30, week ref closes[24] = 25, month ref closes[9] = 10, year ref 1
        assert_eq!(v.weekly_change_value, Some(5.0));
        assert_eq!(v.weekly_change_percent, Some(20.0));
        assert_eq!(v.monthly_change_value, Some(20.0));
        assert_eq!(v.monthly_change_percent, Some(200.0));
        assert_eq!(v.yearly_change_value, Some(29.0));
        assert_eq!(v.yearly_change_percent, Some(2900.0));
    }

    #[test]
    fn short_history_leaves_windows_empty() {
        let v = Volatility::from_closes(&[10.0, 11.0, 12.0]);
        assert_eq!(v.weekly_change_value, None);
        assert_eq!(v.monthly_change_value, None);
        assert_eq!(v.yearly_change_value, Some(2.0));
        assert_eq!(Volatility::from_closes(&[]), Volatility::default());
    }

    #[test]
    fn zero_reference_is_none() {
        let v = Volatility::from_closes(&[0.0, 5.0]);
        assert_eq!(v.yearly_change_value, None);
        assert_eq!(v.yearly_change_percent, None);
    }

    #[test]
    fn jp_ticker_normalisation() {
        assert_eq!(normalize_jp_ticker(" 6501 "), "6501.T");
        assert_eq!(normalize_jp_ticker("１３０Ａ"), "130A.T");
    }

    #[test]
    fn series_csv_download() {
        let series = StockSeries {
            ticker: "7203.T".into(),
            points: vec![PricePoint {
                date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
                close: 3301.5,
            }],
        };
        let today = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
        assert_eq!(series.download_file_name(today), "20240604_7203_stockData.csv");
        let csv = String::from_utf8(series.to_csv_bytes().unwrap()).unwrap();
        assert_eq!(csv, "Date,Close\n2024-06-03,3301.5\n");
    }
}
