use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::chart::{Chart, Trace, XAxis, day_number};
use crate::error::{Error, Result};
use crate::market::StockSeries;

/// Days predicted past the last close
pub const FORECAST_DAYS: i64 = 60;

// Two-sided 80% band of a normal residual
const BAND_Z: f64 = 1.2816;

/// One fitted or predicted close
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

/// Linear trend fitted to a price history
///
/// `points` covers every historical date followed by one point per calendar
/// day of the horizon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub ticker: String,
    pub history_len: usize,
    pub points: Vec<ForecastPoint>,
}

impl Forecast {
    /// Points after the last historical close
    pub fn future(&self) -> &[ForecastPoint] {
        &self.points[self.history_len..]
    }

    /// Chart with the predicted line over the historical closes
    pub fn chart(&self, history: &StockSeries) -> Chart {
        let predicted = Trace {
            name: "Predicted Close".to_string(),
            points: self
                .points
                .iter()
                .map(|p| (day_number(p.date), p.yhat))
                .collect(),
        };
        let historical = Trace {
            name: "Historical Close".to_string(),
            points: history
                .points
                .iter()
                .map(|p| (day_number(p.date), p.close))
                .collect(),
        };

        Chart {
            title: format!("{} forecast", self.ticker),
            x_label: "Date".to_string(),
            y_label: "Price".to_string(),
            x_axis: XAxis::Date,
            traces: vec![predicted, historical],
            y_range: None,
        }
    }
}

/// Fits a least-squares trend to the closes of `series` and extends it
///
/// # Arguments
/// * `series` - Price history, oldest first
/// * `horizon_days` - Calendar days to predict past the last close
///
/// # Returns
/// * Fitted values for the history and predictions for the horizon, each
///   with a band from the spread of the residuals
///
/// # Errors
/// * `Validation` if the series has fewer than two closes
pub fn forecast(series: &StockSeries, horizon_days: i64) -> Result<Forecast> {
    let (first, last) = match (series.points.first(), series.points.last()) {
        (Some(first), Some(last)) if series.points.len() >= 2 => (first.date, last.date),
        _ => {
            return Err(Error::Validation(format!(
                "Not enough price data to forecast {}.",
                series.ticker
            )));
        }
    };

    let xs: Vec<f64> = series
        .points
        .iter()
        .map(|p| (p.date - first).num_days() as f64)
        .collect();
    let ys = series.closes();
    let (intercept, slope) = fit_line(&xs, &ys);

    let n = xs.len();
    let sse: f64 = xs
        .iter()
        .zip(&ys)
        .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
        .sum();
    let spread = if n > 2 { (sse / (n - 2) as f64).sqrt() } else { 0.0 };

    let point = |date: NaiveDate| {
        let yhat = intercept + slope * (date - first).num_days() as f64;
        ForecastPoint {
            date,
            yhat,
            yhat_lower: yhat - BAND_Z * spread,
            yhat_upper: yhat + BAND_Z * spread,
        }
    };

    let mut points: Vec<ForecastPoint> = series.points.iter().map(|p| point(p.date)).collect();
    points.extend((1..=horizon_days.max(0)).map(|d| point(last + Duration::days(d))));

    Ok(Forecast {
        ticker: series.ticker.clone(),
        history_len: n,
        points,
    })
}

// Ordinary least squares; a flat line through the mean when all x are equal.
fn fit_line(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let sxx: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    if sxx == 0.0 {
        return (mean_y, 0.0);
    }
    let sxy: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let slope = sxy / sxx;
    (mean_y - slope * mean_x, slope)
}
