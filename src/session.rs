#![cfg(feature = "web")]
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::market::Period;
use crate::ticker_list::TickerList;

pub const SESSION_COOKIE: &str = "session";
const SESSION_DURATION: Duration = Duration::from_secs(24 * 60 * 60);
/// Lifetime of a session nothing has been written to yet
const ANONYMOUS_DURATION: Duration = Duration::from_secs(20 * 60);

/// State of one browser session
///
/// Created on the first request without a live session cookie and dropped on
/// logout or expiry. A new session lives for `ANONYMOUS_DURATION`; the first
/// write through [`Sessions::update`] extends it to the full day.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Set by a successful login, cleared by logout
    pub authenticated: bool,

    /// Tickers added on the settings page
    pub ticker_list: TickerList,

    /// Record ids ticked on the data viewer
    pub selected_ids: Vec<u64>,

    /// Last period chosen on the US page
    pub period: Period,

    /// The cookie notice is shown once per session
    pub cookie_notice_shown: bool,

    pub expires_at: SystemTime,
}

impl SessionContext {
    fn new() -> Self {
        SessionContext {
            authenticated: false,
            ticker_list: TickerList::default(),
            selected_ids: Vec::new(),
            period: Period::default(),
            cookie_notice_shown: false,
            expires_at: SystemTime::now() + ANONYMOUS_DURATION,
        }
    }

    fn is_live(&self) -> bool {
        self.expires_at > SystemTime::now()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// All live sessions, keyed by the id stored in the `session` cookie
#[derive(Debug, Default)]
pub struct Sessions {
    inner: RwLock<HashMap<String, SessionContext>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live session named by the cookie, or starts a new one
    ///
    /// # Returns
    /// * The jar (with a fresh cookie if a session was created) and the session id
    pub fn open(&self, jar: CookieJar) -> (CookieJar, String) {
        if let Some(cookie) = jar.get(SESSION_COOKIE) {
            let id = cookie.value().to_string();
            let sessions = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            if sessions.get(&id).is_some_and(SessionContext::is_live) {
                return (jar, id);
            }
        }

        let id = Uuid::new_v4().to_string();
        {
            let mut sessions = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            sessions.retain(|_, s| s.is_live());
            sessions.insert(id.clone(), SessionContext::new());
        }

        let cookie = Cookie::build((SESSION_COOKIE, id.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();
        (jar.add(cookie), id)
    }

    /// Snapshot of a session
    pub fn get(&self, id: &str) -> Option<SessionContext> {
        let sessions = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(id).filter(|s| s.is_live()).cloned()
    }

    /// Applies `f` to a live session and returns its result
    ///
    /// The session then expires `SESSION_DURATION` from now.
    pub fn update<T>(&self, id: &str, f: impl FnOnce(&mut SessionContext) -> T) -> Option<T> {
        let mut sessions = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        sessions.get_mut(id).filter(|s| s.is_live()).map(|s| {
            s.expires_at = SystemTime::now() + SESSION_DURATION;
            f(s)
        })
    }

    /// Records that the cookie notice was shown, keeping the current expiry
    pub fn mark_notice_shown(&self, id: &str) {
        let mut sessions = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(s) = sessions.get_mut(id).filter(|s| s.is_live()) {
            s.cookie_notice_shown = true;
        }
    }

    /// Ends a session
    pub fn teardown(&self, id: &str) {
        let mut sessions = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(id);
    }

    /// Drops every expired session; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, s| s.is_live());
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
