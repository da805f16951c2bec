mod jar;

use std::time::Duration;

pub use jar::Cookies;

use crate::utils::{SECONDS_PER_DAY, utc_now_secs};

/// A single HTTP cookie.
///
/// `expires` is a unix timestamp in seconds, `0` marks a session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub expires: u64,
    pub path: String,
    pub domain: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
    pub(crate) modified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl From<SameSite> for cookie_monster::SameSite {
    fn from(value: SameSite) -> Self {
        match value {
            SameSite::Strict => cookie_monster::SameSite::Strict,
            SameSite::Lax => cookie_monster::SameSite::Lax,
            SameSite::None => cookie_monster::SameSite::None,
        }
    }
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires: 0,
            path: String::new(),
            domain: String::new(),
            secure: false,
            http_only: false,
            same_site: None,
            modified: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether this cookie was created, replaced or invalidated since it was
    /// received, and so needs to be sent back to the client.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn is_invalidated(&self) -> bool {
        self.value.is_empty() && self.expires != 0 && self.expires < utc_now_secs()
    }

    /// Wipe the value and move the expiry a day into the past, which clients
    /// treat as a deletion.
    pub fn invalidate(&mut self) {
        self.modified = true;

        if self.is_invalidated() {
            return;
        }

        self.value.clear();
        self.expires = utc_now_secs().saturating_sub(SECONDS_PER_DAY);
    }

    pub fn to_set_cookie(&self) -> cookie_monster::Cookie {
        cookie_monster::Cookie::from(self)
    }
}

impl From<&Cookie> for cookie_monster::Cookie {
    fn from(cookie: &Cookie) -> Self {
        let mut builder =
            cookie_monster::Cookie::named(cookie.name.clone()).value(cookie.value.clone());

        if !cookie.path.is_empty() {
            builder = builder.path(cookie.path.clone());
        }

        if !cookie.domain.is_empty() {
            builder = builder.domain(cookie.domain.clone());
        }

        if cookie.secure {
            builder = builder.secure();
        }

        if cookie.http_only {
            builder = builder.http_only();
        }

        if let Some(same_site) = cookie.same_site {
            builder = builder.same_site(cookie_monster::SameSite::from(same_site));
        }

        if cookie.expires != 0 {
            // Anything already expired is sent as `Max-Age=0`.
            let remaining = cookie.expires.saturating_sub(utc_now_secs());
            builder = builder.max_age(Duration::from_secs(remaining));
        }

        builder.build()
    }
}

/// A cookie received in a `Cookie` request header, which only carries a name
/// and a value.
impl From<&cookie_monster::Cookie> for Cookie {
    fn from(cookie: &cookie_monster::Cookie) -> Self {
        Cookie::new(cookie.name(), cookie.value())
    }
}
