use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use cookie_monster::CookieJar;
use http::{HeaderMap, header::COOKIE};

use crate::cookie::Cookie;

/// Cookies belonging to a single request.
///
/// Clones share the same underlying collection, so a session backend holding
/// a handle sees (and can invalidate) the cookies of the request it was
/// attached to.
#[derive(Clone, Default, Debug)]
pub struct Cookies(Arc<Mutex<BTreeMap<String, Cookie>>>);

impl Cookies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the value of a `Cookie` request header. Parsed cookies are not
    /// marked as modified.
    pub fn from_header(header: &str) -> Self {
        let cookies = Cookies::new();
        cookies.extend_from_header(header);
        cookies
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        let cookies = Cookies::new();

        for value in headers.get_all(COOKIE) {
            if let Ok(value) = value.to_str() {
                cookies.extend_from_header(value);
            }
        }

        cookies
    }

    /// Pairs that fail to parse are skipped. When a name repeats, the first
    /// value wins, like in [`cookie_monster::CookieJar`].
    fn extend_from_header(&self, header: &str) {
        let mut lock = self.lock();

        let parsed = header
            .split(';')
            .filter_map(|pair| cookie_monster::Cookie::parse_cookie_encoded(pair).ok());

        for cookie in parsed {
            lock.entry(cookie.name().to_owned())
                .or_insert_with(|| Cookie::from(&cookie));
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Cookie>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a cookie, replacing any cookie with the same name.
    pub fn set(&self, mut cookie: Cookie) {
        cookie.modified = true;
        self.lock().insert(cookie.name.clone(), cookie);
    }

    /// Create a cookie with the common attributes and store it.
    pub fn add(
        &self,
        name: impl Into<String>,
        value: impl Into<String>,
        expires: u64,
        secure: bool,
        http_only: bool,
    ) -> Cookie {
        let mut cookie = Cookie::new(name, value);
        cookie.expires = expires;
        cookie.secure = secure;
        cookie.http_only = http_only;
        cookie.modified = true;

        self.lock().insert(cookie.name.clone(), cookie.clone());
        cookie
    }

    pub fn get(&self, name: &str) -> Option<Cookie> {
        self.lock().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Invalidate the named cookie so the client deletes it. The cookie stays
    /// in the collection so it is still sent back.
    pub fn remove(&self, name: &str) {
        if let Some(cookie) = self.lock().get_mut(name) {
            cookie.invalidate();
        }
    }

    pub fn all(&self) -> Vec<Cookie> {
        self.lock().values().cloned().collect()
    }

    /// The cookies that have to be sent back to the client. Invalidated
    /// cookies become removals.
    pub fn to_jar(&self) -> CookieJar {
        let mut jar = CookieJar::empty();

        for cookie in self.lock().values().filter(|cookie| cookie.is_modified()) {
            if cookie.is_invalidated() {
                jar.remove(cookie_monster::Cookie::from(cookie));
            } else {
                jar.add(cookie_monster::Cookie::from(cookie));
            }
        }

        jar
    }

    /// Append a `Set-Cookie` header for every modified cookie.
    pub fn write_to(&self, headers: &mut HeaderMap) {
        self.to_jar().write_cookies(headers);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponseParts for Cookies {
    type Error = std::convert::Infallible;

    fn into_response_parts(
        self,
        res: axum::response::ResponseParts,
    ) -> Result<axum::response::ResponseParts, Self::Error> {
        axum::response::IntoResponseParts::into_response_parts(self.to_jar(), res)
    }
}
