use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

const DEFAULT_DATA_PATH: &str = "data";
const DEFAULT_DB_PATH: &str = "data/db.json";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8501";
const DEFAULT_FROM_SITE: &str = "stock-viewer";
const DEFAULT_SHEET_NAME: &str = "users";
const DEFAULT_QUOTE_API_BASE: &str = "https://query1.finance.yahoo.com";
const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60;
const DEFAULT_UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

/// Where login rows come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserSourceConfig {
    /// Local `username,pass` CSV file.
    CsvFile(PathBuf),
    /// Spreadsheet published on the web, read through its CSV export.
    PublishedSheet { key: String, sheet_name: String },
}

/// Application settings read from the environment.
///
/// The server binary loads `.env` first, so every key can live there as well.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory uploaded CSV files are copied into (`DATA_PATH`)
    pub data_path: PathBuf,

    /// Backing file of the record store (`DB_PATH`)
    pub db_path: PathBuf,

    /// Address the HTTP server listens on (`BIND_ADDR`)
    pub bind_addr: String,

    /// Endpoint the contact form posts to (`CONTACT_API_ENDPOINT`)
    pub contact_endpoint: Option<String>,

    /// `from_site` value sent with contact submissions (`CONTACT_FROM_SITE`)
    pub contact_from_site: String,

    /// Login source, if any is configured
    pub user_source: Option<UserSourceConfig>,

    /// Base URL of the quote API (`QUOTE_API_BASE`)
    pub quote_api_base: String,

    /// How long fetched series stay cached (`QUOTE_CACHE_TTL_SECS`)
    pub quote_cache_ttl: Duration,

    /// Maximum request body size (`UPLOAD_LIMIT_BYTES`)
    pub upload_limit: usize,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through an arbitrary key lookup.
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let user_source = match (get("USERS_CSV"), get("GOOGLE_SP_SHEET_KEY")) {
            (Some(path), _) => Some(UserSourceConfig::CsvFile(PathBuf::from(path))),
            (None, Some(key)) => Some(UserSourceConfig::PublishedSheet {
                key,
                sheet_name: get("GOOGLE_SP_SHEET_NAME")
                    .unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string()),
            }),
            (None, None) => None,
        };

        let ttl_secs = match get("QUOTE_CACHE_TTL_SECS") {
            Some(raw) => parse_number::<u64>("QUOTE_CACHE_TTL_SECS", &raw)?,
            None => DEFAULT_CACHE_TTL_SECS,
        };

        let upload_limit = match get("UPLOAD_LIMIT_BYTES") {
            Some(raw) => parse_number::<usize>("UPLOAD_LIMIT_BYTES", &raw)?,
            None => DEFAULT_UPLOAD_LIMIT,
        };

        Ok(Settings {
            data_path: PathBuf::from(get("DATA_PATH").unwrap_or_else(|| DEFAULT_DATA_PATH.into())),
            db_path: PathBuf::from(get("DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.into())),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            contact_endpoint: get("CONTACT_API_ENDPOINT"),
            contact_from_site: get("CONTACT_FROM_SITE")
                .unwrap_or_else(|| DEFAULT_FROM_SITE.into()),
            user_source,
            quote_api_base: get("QUOTE_API_BASE")
                .unwrap_or_else(|| DEFAULT_QUOTE_API_BASE.into()),
            quote_cache_ttl: Duration::from_secs(ttl_secs),
            upload_limit,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            contact_endpoint: None,
            contact_from_site: DEFAULT_FROM_SITE.to_string(),
            user_source: None,
            quote_api_base: DEFAULT_QUOTE_API_BASE.to_string(),
            quote_cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            upload_limit: DEFAULT_UPLOAD_LIMIT,
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| Error::Config {
        key,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.data_path, PathBuf::from("data"));
        assert_eq!(s.db_path, PathBuf::from("data/db.json"));
        assert_eq!(s.bind_addr, "127.0.0.1:8501");
        assert!(s.contact_endpoint.is_none());
        assert!(s.user_source.is_none());
        assert_eq!(s.quote_cache_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn users_csv_wins_over_sheet() {
        let s = settings(&[("USERS_CSV", "users.csv"), ("GOOGLE_SP_SHEET_KEY", "abc")]).unwrap();
        assert_eq!(
            s.user_source,
            Some(UserSourceConfig::CsvFile(PathBuf::from("users.csv")))
        );
    }

    #[test]
    fn sheet_name_defaults() {
        let s = settings(&[("GOOGLE_SP_SHEET_KEY", "abc")]).unwrap();
        assert_eq!(
            s.user_source,
            Some(UserSourceConfig::PublishedSheet {
                key: "abc".into(),
                sheet_name: "users".into()
            })
        );
    }

    #[test]
    fn bad_number_names_the_key() {
        let err = settings(&[("QUOTE_CACHE_TTL_SECS", "soon")]).unwrap_err();
        assert!(matches!(err, Error::Config { key: "QUOTE_CACHE_TTL_SECS", .. }));
    }
}
