use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
            .unwrap();
}

/// Message sent through the contact page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub body: String,
    #[serde(default)]
    pub from_site: String,
}

impl ContactForm {
    /// Checks required fields and the email address syntax
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.email.trim().is_empty() || self.body.trim().is_empty()
        {
            return Err(Error::Validation(
                "Please fill out all required fields.".to_string(),
            ));
        }
        if !EMAIL_RE.is_match(self.email.trim()) {
            return Err(Error::Validation(format!(
                "Invalid email address. {}",
                self.email.trim()
            )));
        }
        Ok(())
    }
}

/// What the contact endpoint answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum ContactOutcome {
    Sent,
    Failed(String),
}

#[cfg(feature = "web")]
pub use client::ContactClient;

#[cfg(feature = "web")]
mod client {
    use super::{ContactForm, ContactOutcome};
    use crate::error::Result;
    use reqwest::{Client, StatusCode};
    use std::time::Duration;

    const SUCCESS_MESSAGE: &str = "success!";

    /// Posts contact forms to the configured endpoint
    pub struct ContactClient {
        client: Client,
        endpoint: String,
        from_site: String,
    }

    impl ContactClient {
        pub fn new(endpoint: &str, from_site: &str) -> Result<Self> {
            let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
            Ok(Self {
                client,
                endpoint: endpoint.to_string(),
                from_site: from_site.to_string(),
            })
        }

        /// Validates and submits the form
        ///
        /// Success is a 200 response whose JSON `message` is `"success!"`.
        pub async fn submit(&self, form: &ContactForm) -> Result<ContactOutcome> {
            form.validate()?;

            let from_site = if form.from_site.trim().is_empty() {
                self.from_site.as_str()
            } else {
                form.from_site.as_str()
            };
            let fields = [
                ("name", form.name.trim()),
                ("email", form.email.trim()),
                ("body", form.body.as_str()),
                ("from_site", from_site),
            ];

            let response = self.client.post(&self.endpoint).form(&fields).send().await?;
            if response.status() != StatusCode::OK {
                log::warn!("contact endpoint answered {}", response.status());
                return Ok(ContactOutcome::Failed("An error occurred.".to_string()));
            }

            let body: serde_json::Value = response.json().await?;
            let message = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or_default();
            if message == SUCCESS_MESSAGE {
                log::info!("contact form from {} delivered", form.email.trim());
                Ok(ContactOutcome::Sent)
            } else {
                Ok(ContactOutcome::Failed(message.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, email: &str, body: &str) -> ContactForm {
        ContactForm {
            name: name.into(),
            email: email.into(),
            body: body.into(),
            from_site: String::new(),
        }
    }

    #[test]
    fn requires_all_fields() {
        let err = form("", "a@example.com", "hi").validate().unwrap_err();
        assert_eq!(err.to_string(), "Please fill out all required fields.");
        assert!(form("Aki", "a@example.com", "  ").validate().is_err());
    }

    #[test]
    fn checks_email_syntax() {
        assert!(form("Aki", "a@example.com", "hi").validate().is_ok());
        assert!(form("Aki", "not-an-email", "hi").validate().is_err());
        assert!(form("Aki", "a@localhost", "hi").validate().is_err());
    }
}
