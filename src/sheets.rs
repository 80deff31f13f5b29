#![cfg(feature = "web")]
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::auth::{UserRow, UserSource, parse_user_table};
use crate::error::{Error, Result};

pub const GOOGLE_DOCS_BASE: &str = "https://docs.google.com";

/// User table kept in a published spreadsheet
///
/// The sheet is read through its CSV export on every login attempt, so the
/// first row must hold the `username` and `pass` headers.
pub struct PublishedSheetUsers {
    client: Client,
    base_url: String,
    sheet_key: String,
    sheet_name: String,
}

impl PublishedSheetUsers {
    pub fn new(base_url: &str, sheet_key: &str, sheet_name: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            sheet_key: sheet_key.to_string(),
            sheet_name: sheet_name.to_string(),
        })
    }

    fn export_url(&self) -> String {
        format!("{}/spreadsheets/d/{}/gviz/tq", self.base_url, self.sheet_key)
    }
}

#[async_trait]
impl UserSource for PublishedSheetUsers {
    async fn fetch_users(&self) -> Result<Vec<UserRow>> {
        let response = self
            .client
            .get(self.export_url())
            .query(&[("tqx", "out:csv"), ("sheet", self.sheet_name.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Provider(format!(
                "spreadsheet {} returned {}",
                self.sheet_key,
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        parse_user_table(&format!("sheet {}", self.sheet_name), &bytes)
    }
}
