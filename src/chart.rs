use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::error::{Error, Result};
use crate::ingest::UploadName;
use crate::market::StockSeries;
use crate::store::RecordStore;

/// How x values of a chart are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum XAxis {
    /// x is a day number (`NaiveDate::num_days_from_ce`)
    Date,
    /// x is a plain number
    Numeric,
}

/// One line on a chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

/// Overlay of line traces on one shared pair of axes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_axis: XAxis,
    pub traces: Vec<Trace>,
    /// Fixed y range; derived from the data when `None`
    pub y_range: Option<(f64, f64)>,
}

/// Parameters for building a chart out of stored CSV files
#[derive(Debug, Clone)]
pub struct ChartRequest {
    pub x_col: String,
    pub y_col: String,
    pub title: String,
    /// File-name segment used as trace label
    pub label_segment: usize,
}

impl Default for ChartRequest {
    fn default() -> Self {
        ChartRequest {
            x_col: "Date".to_string(),
            y_col: "Close".to_string(),
            title: "Stock price over time".to_string(),
            label_segment: 2,
        }
    }
}

impl Chart {
    /// Chart of fetched closing prices, one trace per ticker
    pub fn from_series(series: &[StockSeries], title: &str, y_range: Option<(f64, f64)>) -> Self {
        let traces = series
            .iter()
            .map(|s| Trace {
                name: s.ticker.clone(),
                points: s
                    .points
                    .iter()
                    .map(|p| (day_number(p.date), p.close))
                    .collect(),
            })
            .collect();

        Chart {
            title: title.to_string(),
            x_label: "Date".to_string(),
            y_label: "StockPrice [$]".to_string(),
            x_axis: XAxis::Date,
            traces,
            y_range,
        }
    }

    /// Smallest and largest x over all traces
    pub fn x_bounds(&self) -> Option<(f64, f64)> {
        bounds(self.traces.iter().flat_map(|t| t.points.iter().map(|p| p.0)))
    }

    /// Smallest and largest y over all traces, or the fixed range
    pub fn y_bounds(&self) -> Option<(f64, f64)> {
        self.y_range
            .or_else(|| bounds(self.traces.iter().flat_map(|t| t.points.iter().map(|p| p.1))))
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

pub(crate) fn day_number(date: NaiveDate) -> f64 {
    date.num_days_from_ce() as f64
}

/// Builds one chart overlaying the CSV files behind the given record ids
///
/// Each record contributes one trace named after the file-name segment at
/// `request.label_segment`.
///
/// # Errors
/// * `Validation` if `ids` is empty
/// * `RecordNotFound` if an id has no record
/// * `Io` if a referenced file cannot be opened
/// * `MissingColumn` if a file lacks `x_col` or `y_col`
/// * `NonPlottable` if x values are neither dates nor numbers, or traces disagree
pub fn assemble_chart(store: &RecordStore, ids: &[u64], request: &ChartRequest) -> Result<Chart> {
    if ids.is_empty() {
        return Err(Error::Validation("Select at least one record".to_string()));
    }

    let mut traces = Vec::with_capacity(ids.len());
    let mut axis: Option<XAxis> = None;

    for &id in ids {
        let record = store.get_by_id(id)?.ok_or(Error::RecordNotFound(id))?;
        let path = Path::new(&record.file_path);
        let (trace_axis, points) = load_columns(path, &request.x_col, &request.y_col)?;

        match axis {
            None => axis = Some(trace_axis),
            Some(a) if a != trace_axis => {
                return Err(Error::NonPlottable {
                    column: request.x_col.clone(),
                    value: format!("{} mixes dates and numbers", record.file_name),
                });
            }
            Some(_) => {}
        }

        traces.push(Trace {
            name: trace_label(path, request.label_segment),
            points,
        });
    }

    Ok(Chart {
        title: request.title.clone(),
        x_label: request.x_col.clone(),
        y_label: request.y_col.clone(),
        x_axis: axis.unwrap_or(XAxis::Date),
        traces,
        y_range: None,
    })
}

/// Label for a trace read from `path`
///
/// Uses the file-name segment at `segment`; names outside the upload
/// contract fall back to the file stem.
pub fn trace_label(path: &Path, segment: usize) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Ok(name) = UploadName::parse(&file_name) {
        if let Some(label) = name.segment(segment) {
            return label.to_string();
        }
    }

    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(file_name)
}

fn load_columns(path: &Path, x_col: &str, y_col: &str) -> Result<(XAxis, Vec<(f64, f64)>)> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = csv::Reader::from_reader(file);
    let headers = reader.headers()?.clone();

    let find = |column: &str| {
        headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| Error::MissingColumn {
                source_name: path.display().to_string(),
                column: column.to_string(),
            })
    };
    let x_idx = find(x_col)?;
    let y_idx = find(y_col)?;

    let mut axis: Option<XAxis> = None;
    let mut points = Vec::new();

    for row in reader.records() {
        let row = row?;
        let (Some(raw_x), Some(raw_y)) = (row.get(x_idx), row.get(y_idx)) else {
            continue;
        };
        let Ok(y) = raw_y.trim().parse::<f64>() else {
            continue;
        };
        if !y.is_finite() {
            continue;
        }

        let (kind, x) = parse_x(raw_x).ok_or_else(|| Error::NonPlottable {
            column: x_col.to_string(),
            value: raw_x.to_string(),
        })?;
        match axis {
            None => axis = Some(kind),
            Some(a) if a != kind => {
                return Err(Error::NonPlottable {
                    column: x_col.to_string(),
                    value: raw_x.to_string(),
                });
            }
            Some(_) => {}
        }
        points.push((x, y));
    }

    Ok((axis.unwrap_or(XAxis::Date), points))
}

// Accepts "2024-06-01" as well as "2024-06-01 00:00:00+09:00".
fn parse_x(raw: &str) -> Option<(XAxis, f64)> {
    let raw = raw.trim();
    if let Some(prefix) = raw.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some((XAxis::Date, day_number(date)));
        }
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| (XAxis::Numeric, v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dates_and_numbers() {
        let d = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(parse_x("2024-06-01"), Some((XAxis::Date, day_number(d))));
        assert_eq!(
            parse_x("2024-06-01 00:00:00+09:00"),
            Some((XAxis::Date, day_number(d)))
        );
        assert_eq!(parse_x("3.5"), Some((XAxis::Numeric, 3.5)));
        assert_eq!(parse_x("June"), None);
    }

    #[test]
    fn label_uses_segment_then_stem() {
        assert_eq!(trace_label(Path::new("data/20240601_JP_7203.csv"), 2), "7203");
        assert_eq!(trace_label(Path::new("data/20240601_JP_7203.csv"), 1), "JP");
        assert_eq!(trace_label(Path::new("data/prices.csv"), 2), "prices");
    }

    #[test]
    fn bounds_cover_all_traces() {
        let chart = Chart {
            title: String::new(),
            x_label: String::new(),
            y_label: String::new(),
            x_axis: XAxis::Numeric,
            traces: vec![
                Trace { name: "a".into(), points: vec![(1.0, 5.0), (2.0, 7.0)] },
                Trace { name: "b".into(), points: vec![(0.0, 9.0)] },
            ],
            y_range: None,
        };
        assert_eq!(chart.x_bounds(), Some((0.0, 2.0)));
        assert_eq!(chart.y_bounds(), Some((5.0, 9.0)));
    }
}
