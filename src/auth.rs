use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// One row of the user table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserRow {
    pub username: String,

    /// Stored in clear text by the table owner
    #[serde(rename = "pass")]
    pub password: String,
}

/// Why a login attempt was turned down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Zero or several rows carry the username
    NotFoundOrNotUnique,
    /// The single matching row has a different password
    WrongPassword,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NotFoundOrNotUnique => {
                f.write_str("The target name is not unique or does not exist.")
            }
            RejectReason::WrongPassword => f.write_str("Incorrect password."),
        }
    }
}

/// Result of a login check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated,
    Rejected(RejectReason),
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated)
    }
}

impl Serialize for AuthOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        match self {
            AuthOutcome::Authenticated => {
                let mut s = serializer.serialize_struct("AuthOutcome", 1)?;
                s.serialize_field("status", "authenticated")?;
                s.end()
            }
            AuthOutcome::Rejected(reason) => {
                let mut s = serializer.serialize_struct("AuthOutcome", 3)?;
                s.serialize_field("status", "rejected")?;
                s.serialize_field("reason", reason)?;
                s.serialize_field("message", &reason.to_string())?;
                s.end()
            }
        }
    }
}

/// Somewhere the full user table can be read from
#[async_trait]
pub trait UserSource: Send + Sync {
    /// Reads every row; called once per login attempt.
    async fn fetch_users(&self) -> Result<Vec<UserRow>>;
}

/// Checks a username and password against the user table
///
/// The username must appear on exactly one row and that row's password must
/// match exactly.
///
/// # Arguments
/// * `source` - Where the user table is read from
/// * `username` - Name typed on the login form
/// * `password` - Password typed on the login form
///
/// # Returns
/// * `Ok(AuthOutcome)` - Authenticated, or rejected with a reason
///
/// # Errors
/// * Returns an error if the user table cannot be read; this is never
///   reported as a rejection
pub async fn authenticate(
    source: &dyn UserSource,
    username: &str,
    password: &str,
) -> Result<AuthOutcome> {
    let users = source.fetch_users().await?;
    Ok(check_credentials(&users, username, password))
}

/// Pure part of [`authenticate`]
pub fn check_credentials(users: &[UserRow], username: &str, password: &str) -> AuthOutcome {
    let mut matches = users.iter().filter(|u| u.username == username);
    let (Some(user), None) = (matches.next(), matches.next()) else {
        return AuthOutcome::Rejected(RejectReason::NotFoundOrNotUnique);
    };

    if user.password == password {
        AuthOutcome::Authenticated
    } else {
        AuthOutcome::Rejected(RejectReason::WrongPassword)
    }
}

/// Parses a `username,pass` table with a header row
///
/// Columns may come in any order and extra columns are ignored.
pub fn parse_user_table(source_name: &str, bytes: &[u8]) -> Result<Vec<UserRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    for column in ["username", "pass"] {
        if !headers.iter().any(|h| h == column) {
            return Err(Error::MissingColumn {
                source_name: source_name.to_string(),
                column: column.to_string(),
            });
        }
    }

    let mut rows = Vec::new();
    for row in reader.deserialize::<UserRow>() {
        rows.push(row?);
    }
    Ok(rows)
}

/// User table kept in a local CSV file
#[derive(Debug, Clone)]
pub struct CsvFileUsers {
    path: PathBuf,
}

impl CsvFileUsers {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvFileUsers { path: path.into() }
    }
}

#[async_trait]
impl UserSource for CsvFileUsers {
    async fn fetch_users(&self) -> Result<Vec<UserRow>> {
        let bytes = std::fs::read(&self.path).map_err(|e| Error::io(&self.path, e))?;
        parse_user_table(&self.path.display().to_string(), &bytes)
    }
}

/// Fixed in-memory user table
#[derive(Debug, Clone, Default)]
pub struct StaticUsers(pub Vec<UserRow>);

#[async_trait]
impl UserSource for StaticUsers {
    async fn fetch_users(&self) -> Result<Vec<UserRow>> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(username: &str, password: &str) -> UserRow {
        UserRow {
            username: username.into(),
            password: password.into(),
        }
    }

    #[test]
    fn outcome_json_shape() {
        let ok = serde_json::to_value(AuthOutcome::Authenticated).unwrap();
        assert_eq!(ok, serde_json::json!({"status": "authenticated"}));

        let rejected =
            serde_json::to_value(AuthOutcome::Rejected(RejectReason::WrongPassword)).unwrap();
        assert_eq!(rejected["status"], "rejected");
        assert_eq!(rejected["reason"], "wrong_password");
        assert_eq!(rejected["message"], "Incorrect password.");
    }

    #[test]
    fn duplicate_names_are_rejected_even_with_right_password() {
        let users = vec![row("alice", "secret"), row("alice", "secret")];
        assert_eq!(
            check_credentials(&users, "alice", "secret"),
            AuthOutcome::Rejected(RejectReason::NotFoundOrNotUnique)
        );
    }

    #[test]
    fn parses_table_with_extra_columns() {
        let csv = b"email,pass,username\na@example.com,secret,alice\n";
        let rows = parse_user_table("users.csv", csv).unwrap();
        assert_eq!(rows, vec![row("alice", "secret")]);
    }

    #[test]
    fn missing_pass_column() {
        let err = parse_user_table("users.csv", b"username,password\nalice,x\n").unwrap_err();
        assert!(matches!(err, Error::MissingColumn { ref column, .. } if column == "pass"));
    }
}
