//! In-memory sessions keyed by a random cookie: logged-in operator and
//! pending flash messages.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use actix_web::cookie::{Cookie, SameSite};
use actix_web::HttpRequest;
use tracing::debug;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "plate_gate_session";

/// Idle time after which a session holding only flash messages is dropped.
pub const ANONYMOUS_TTL: Duration = Duration::from_secs(10 * 60);
/// Idle time after which an operator has to log in again.
pub const LOGGED_IN_TTL: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Debug)]
struct SessionData {
    user_id: Option<i64>,
    flashes: Vec<String>,
    last_seen: Instant,
}

impl SessionData {
    fn new(user_id: Option<i64>) -> Self {
        Self {
            user_id,
            flashes: Vec::new(),
            last_seen: Instant::now(),
        }
    }
}

/// Idle sessions are evicted whenever the store is written to.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionData>>>,
    anonymous_ttl: Duration,
    logged_in_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(ANONYMOUS_TTL, LOGGED_IN_TTL)
    }
}

impl SessionStore {
    pub fn with_ttl(anonymous_ttl: Duration, logged_in_ttl: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            anonymous_ttl,
            logged_in_ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn user_id(&self, req: &HttpRequest) -> Option<i64> {
        let id = session_id(req)?;
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(&id)
            .filter(|data| !self.expired(data))
            .and_then(|data| data.user_id)
    }

    fn expired(&self, data: &SessionData) -> bool {
        let ttl = match data.user_id {
            Some(_) => self.logged_in_ttl,
            None => self.anonymous_ttl,
        };
        data.last_seen.elapsed() >= ttl
    }

    fn evict_expired(&self, sessions: &mut HashMap<String, SessionData>) {
        let before = sessions.len();
        sessions.retain(|_, data| !self.expired(data));
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!("Evicted {} idle sessions", evicted);
        }
    }

    /// Bind `user_id` to a fresh session id and queue `message` on it.
    /// The returned cookie must be sent with the response.
    pub fn login(&self, req: &HttpRequest, user_id: i64, message: &str) -> Cookie<'static> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        self.evict_expired(&mut sessions);

        let mut data = SessionData::new(Some(user_id));
        if let Some(old) = session_id(req).and_then(|old| sessions.remove(&old)) {
            data.flashes = old.flashes;
        }
        data.flashes.push(message.to_string());

        let id = new_session_id();
        sessions.insert(id.clone(), data);
        session_cookie(id)
    }

    pub fn logout(&self, req: &HttpRequest) {
        if let Some(id) = session_id(req) {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(data) = sessions.get_mut(&id) {
                data.user_id = None;
                data.last_seen = Instant::now();
            }
        }
    }

    /// Queue a message for the next rendered page. Returns a cookie when a
    /// session had to be created for the request.
    pub fn push_flash(&self, req: &HttpRequest, message: &str) -> Option<Cookie<'static>> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        self.evict_expired(&mut sessions);

        // Unknown or expired ids are not revived; the client gets a new one
        let (id, created) = match session_id(req) {
            Some(id) if sessions.contains_key(&id) => (id, false),
            _ => (new_session_id(), true),
        };

        let data = sessions
            .entry(id.clone())
            .or_insert_with(|| SessionData::new(None));
        data.flashes.push(message.to_string());
        data.last_seen = Instant::now();

        created.then(|| session_cookie(id))
    }

    /// Drain queued messages. Anonymous sessions with nothing left are dropped.
    pub fn take_flashes(&self, req: &HttpRequest) -> Vec<String> {
        let Some(id) = session_id(req) else {
            return Vec::new();
        };

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        self.evict_expired(&mut sessions);
        let Some(data) = sessions.get_mut(&id) else {
            return Vec::new();
        };

        data.last_seen = Instant::now();
        let flashes = std::mem::take(&mut data.flashes);
        if data.user_id.is_none() {
            sessions.remove(&id);
        }
        flashes
    }
}

fn session_id(req: &HttpRequest) -> Option<String> {
    req.cookie(SESSION_COOKIE).map(|c| c.value().to_string())
}

fn new_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn session_cookie(id: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, id)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn with_cookie(cookie: &Cookie<'static>) -> HttpRequest {
        TestRequest::default().cookie(cookie.clone()).to_http_request()
    }

    #[test]
    fn test_flash_creates_session_once() {
        let store = SessionStore::default();
        let anonymous = TestRequest::default().to_http_request();

        let cookie = store.push_flash(&anonymous, "first").unwrap();
        let req = with_cookie(&cookie);
        assert!(store.push_flash(&req, "second").is_none());

        assert_eq!(store.take_flashes(&req), vec!["first", "second"]);
        assert!(store.take_flashes(&req).is_empty());
    }

    #[test]
    fn test_login_rotates_session_and_keeps_flashes() {
        let store = SessionStore::default();
        let anonymous = TestRequest::default().to_http_request();
        let before = store.push_flash(&anonymous, "please log in").unwrap();

        let after = store.login(&with_cookie(&before), 7, "welcome");
        assert_ne!(before.value(), after.value());
        assert_eq!(store.user_id(&with_cookie(&before)), None);

        let req = with_cookie(&after);
        assert_eq!(store.user_id(&req), Some(7));
        assert_eq!(store.take_flashes(&req), vec!["please log in", "welcome"]);
        // Logged-in session survives draining its flashes
        assert_eq!(store.user_id(&req), Some(7));

        store.logout(&req);
        assert_eq!(store.user_id(&req), None);
    }

    #[test]
    fn test_abandoned_flash_sessions_are_evicted() {
        let store = SessionStore::with_ttl(Duration::ZERO, LOGGED_IN_TTL);
        for _ in 0..1_000 {
            let anonymous = TestRequest::default().to_http_request();
            assert!(store.push_flash(&anonymous, "Invalid username or password").is_some());
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_idle_login_expires() {
        let store = SessionStore::with_ttl(ANONYMOUS_TTL, Duration::ZERO);
        let anonymous = TestRequest::default().to_http_request();
        let cookie = store.login(&anonymous, 7, "welcome");
        let req = with_cookie(&cookie);

        assert_eq!(store.user_id(&req), None);
        assert!(store.take_flashes(&req).is_empty());
        assert!(store.is_empty());

        // The stale cookie is replaced rather than brought back
        let fresh = store.push_flash(&req, "Please log in").unwrap();
        assert_ne!(fresh.value(), cookie.value());
    }

    #[test]
    fn test_active_sessions_survive_eviction() {
        let store = SessionStore::default();
        let operator = with_cookie(&store.login(&TestRequest::default().to_http_request(), 7, "hi"));
        for _ in 0..10 {
            store.push_flash(&TestRequest::default().to_http_request(), "x");
        }
        assert_eq!(store.len(), 11);
        assert_eq!(store.user_id(&operator), Some(7));
    }

    #[test]
    fn test_unknown_cookie() {
        let store = SessionStore::default();
        let req = with_cookie(&session_cookie("forged".into()));
        assert_eq!(store.user_id(&req), None);
        assert!(store.take_flashes(&req).is_empty());
    }
}
