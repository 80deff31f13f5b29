use std::io::Write;

use stock_viewer::Error;
use stock_viewer::auth::{AuthOutcome, CsvFileUsers, RejectReason, StaticUsers, UserRow, authenticate};

fn users() -> StaticUsers {
    StaticUsers(vec![
        UserRow {
            username: "alice".into(),
            password: "secret".into(),
        },
        UserRow {
            username: "bob".into(),
            password: "hunter2".into(),
        },
        UserRow {
            username: "bob".into(),
            password: "other".into(),
        },
    ])
}

#[tokio::test]
async fn correct_password_authenticates() {
    let outcome = authenticate(&users(), "alice", "secret").await.unwrap();
    assert_eq!(outcome, AuthOutcome::Authenticated);
    assert!(outcome.is_authenticated());
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let outcome = authenticate(&users(), "alice", "Secret").await.unwrap();
    assert_eq!(outcome, AuthOutcome::Rejected(RejectReason::WrongPassword));
}

#[tokio::test]
async fn unknown_or_ambiguous_names_are_rejected() {
    for name in ["carol", "bob", ""] {
        let outcome = authenticate(&users(), name, "hunter2").await.unwrap();
        assert_eq!(
            outcome,
            AuthOutcome::Rejected(RejectReason::NotFoundOrNotUnique),
            "user {:?}",
            name
        );
    }
}

#[tokio::test]
async fn csv_file_source() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "username,pass").unwrap();
    writeln!(file, "alice,secret").unwrap();
    file.flush().unwrap();

    let source = CsvFileUsers::new(file.path());
    assert!(authenticate(&source, "alice", "secret").await.unwrap().is_authenticated());
    assert!(!authenticate(&source, "alice", "nope").await.unwrap().is_authenticated());
}

#[tokio::test]
async fn unreadable_source_is_an_error_not_a_rejection() {
    let dir = tempfile::tempdir().unwrap();
    let source = CsvFileUsers::new(dir.path().join("missing.csv"));
    let err = authenticate(&source, "alice", "secret").await.unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}
