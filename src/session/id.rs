use std::fmt;

use uuid::Uuid;

use crate::cookie::Cookie;

const MAX_LEN: usize = 128;

#[derive(Debug, Hash, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SessionId(Box<str>);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::now_v7().to_string().into_boxed_str())
    }

    /// Accept an id sent by a client, provided it only holds characters a
    /// generated id could contain.
    pub fn parse(value: &str) -> Option<Self> {
        if !Self::is_valid(value) {
            return None;
        }

        Some(SessionId(value.into()))
    }

    pub fn is_valid(value: &str) -> bool {
        !value.is_empty()
            && value.len() <= MAX_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b',')
    }

    pub fn from_cookie(cookie: &Cookie) -> Option<Self> {
        Self::parse(cookie.value())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
