use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Name of the cookie the list is persisted under
pub const TICKER_LIST_COOKIE: &str = "ticker_list";

/// User-curated, ordered list of ticker symbols
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickerList(Vec<String>);

/// Serialized `{"ticker_list": [...]}` document
#[derive(Debug, Serialize, Deserialize)]
struct TickerListDocument {
    ticker_list: Vec<String>,
}

/// Downloadable serializations of a [`TickerList`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Toml,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Toml => "toml",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ExportFormat::Toml => "application/toml",
            ExportFormat::Json => "application/json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "toml" => Ok(ExportFormat::Toml),
            "json" => Ok(ExportFormat::Json),
            other => Err(Error::InvalidFormat(other.to_string())),
        }
    }
}

/// A file ready to be offered for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl TickerList {
    pub fn new(tickers: Vec<String>) -> Self {
        TickerList(tickers)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.0.iter().any(|t| t == ticker)
    }

    /// Appends a ticker, duplicates allowed
    pub fn push(&mut self, ticker: &str) -> Result<()> {
        let ticker = clean(ticker)?;
        self.0.push(ticker);
        Ok(())
    }

    /// Appends a ticker unless it is already listed
    pub fn push_unique(&mut self, ticker: &str) -> Result<()> {
        let ticker = clean(ticker)?;
        if self.contains(&ticker) {
            return Err(Error::DuplicateTicker(ticker));
        }
        self.0.push(ticker);
        Ok(())
    }

    /// Removes the first occurrence; returns whether anything was removed
    pub fn remove(&mut self, ticker: &str) -> bool {
        match self.0.iter().position(|t| t == ticker) {
            Some(idx) => {
                self.0.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    fn document(&self) -> TickerListDocument {
        TickerListDocument {
            ticker_list: self.0.clone(),
        }
    }

    /// `ticker_list = [...]`
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(&self.document())?)
    }

    pub fn from_toml(input: &str) -> Result<Self> {
        let doc: TickerListDocument = toml::from_str(input)?;
        Ok(TickerList(doc.ticker_list))
    }

    /// `{"ticker_list": [...]}` indented with four spaces
    pub fn to_json(&self) -> Result<String> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.document().serialize(&mut serializer)?;
        String::from_utf8(out).map_err(|e| Error::Validation(e.to_string()))
    }

    pub fn from_json(input: &str) -> Result<Self> {
        let doc: TickerListDocument = serde_json::from_str(input)?;
        Ok(TickerList(doc.ticker_list))
    }

    /// Builds the download for `format`, named `{unix_ts}_ticker_list.{ext}`
    pub fn export(&self, format: ExportFormat, unix_ts: i64) -> Result<Download> {
        let body = match format {
            ExportFormat::Toml => self.to_toml()?,
            ExportFormat::Json => self.to_json()?,
        };
        Ok(Download {
            file_name: format!("{}_ticker_list.{}", unix_ts, format.extension()),
            mime: format.mime(),
            bytes: body.into_bytes(),
        })
    }

    /// Compact JSON array stored in the cookie
    pub fn to_cookie_value(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    /// Reads the cookie value back; unreadable cookies give `None`
    pub fn from_cookie_value(value: &str) -> Option<Self> {
        serde_json::from_str::<Vec<String>>(value).ok().map(TickerList)
    }
}

fn clean(ticker: &str) -> Result<String> {
    let ticker = ticker.trim();
    if ticker.is_empty() {
        return Err(Error::Validation("Enter in your favorite Tick".to_string()));
    }
    Ok(ticker.to_string())
}
