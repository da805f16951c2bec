use std::time::Duration;

use crate::{
    cookie::{Cookie, SameSite},
    session::native::{
        NativeSession,
        runtime::{ProcessRuntime, SessionOptions, SessionRuntime},
    },
};

static DEFAULT_SESSION_COOKIE_NAME: &str = "session";
static DEFAULT_DEV_SESSION_COOKIE_NAME: &str = "dev-session";

pub struct NativeSessionBuilder<R> {
    runtime: R,
    pub(crate) cookie_opts: CookieOptionsBuilder,
    pub(crate) options: SessionOptions,
    pub(crate) cookie_lifetime: Option<Duration>,
}

pub(crate) struct CookieOptionsBuilder {
    pub(crate) dev: bool,
    pub(crate) dev_cookie: Cookie,
    pub(crate) cookie: Cookie,
}

impl CookieOptionsBuilder {
    pub fn new() -> Self {
        // Use "/" as path so all paths can see the cookie in dev mode.
        let mut dev_cookie = Cookie::new(DEFAULT_DEV_SESSION_COOKIE_NAME, "");
        dev_cookie.path = "/".into();
        dev_cookie.same_site = Some(SameSite::Lax);

        let mut cookie = Cookie::new(DEFAULT_SESSION_COOKIE_NAME, "");
        cookie.path = "/".into();
        cookie.same_site = Some(SameSite::Strict);
        cookie.http_only = true;
        cookie.secure = true;

        Self {
            dev: false,
            dev_cookie,
            cookie,
        }
    }

    pub fn build(self) -> Cookie {
        if self.dev {
            self.dev_cookie
        } else {
            self.cookie
        }
    }
}

impl NativeSessionBuilder<ProcessRuntime> {
    pub fn new() -> Self {
        Self {
            runtime: ProcessRuntime::new(),
            cookie_opts: CookieOptionsBuilder::new(),
            options: SessionOptions::default(),
            cookie_lifetime: None,
        }
    }
}

impl Default for NativeSessionBuilder<ProcessRuntime> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> NativeSessionBuilder<R> {
    /// Configure the cookie used outside of dev mode.
    pub fn cookie(mut self, f: impl FnOnce(&mut Cookie)) -> Self {
        f(&mut self.cookie_opts.cookie);
        self
    }

    pub fn dev_cookie(mut self, f: impl FnOnce(&mut Cookie)) -> Self {
        f(&mut self.cookie_opts.dev_cookie);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.cookie_opts.dev_cookie.name = name.clone();
        self.cookie_opts.cookie.name = name;
        self
    }

    pub fn use_dev_cookie(mut self, dev: bool) -> Self {
        self.cookie_opts.dev = dev;
        self
    }

    pub fn use_normal_cookie(self, prod: bool) -> Self {
        self.use_dev_cookie(!prod)
    }

    pub fn strict_mode(mut self, strict: bool) -> Self {
        self.options.strict_mode = strict;
        self
    }

    pub fn max_lifetime(mut self, max_lifetime: Duration) -> Self {
        self.options.max_lifetime = max_lifetime;
        self
    }

    pub fn gc_interval(mut self, interval: Duration) -> Self {
        self.options.gc_interval = interval;
        self
    }

    /// Give the session cookie an expiry instead of making it last for the
    /// browser session.
    pub fn cookie_lifetime(mut self, lifetime: Duration) -> Self {
        self.cookie_lifetime = Some(lifetime);
        self
    }

    pub fn runtime<R1>(self, runtime: R1) -> NativeSessionBuilder<R1> {
        NativeSessionBuilder {
            runtime,
            cookie_opts: self.cookie_opts,
            options: self.options,
            cookie_lifetime: self.cookie_lifetime,
        }
    }
}

impl<R: SessionRuntime> NativeSessionBuilder<R> {
    pub fn try_build(self) -> Result<NativeSession<R>, NativeSessionBuilderError> {
        let cookie = self.cookie_opts.build();

        if cookie.name.is_empty() {
            return Err(NativeSessionBuilderError::EmptyName);
        }

        if cookie.name.contains(|c: char| c.is_whitespace() || c == ';' || c == '=') {
            return Err(NativeSessionBuilderError::InvalidName);
        }

        Ok(NativeSession {
            runtime: self.runtime,
            cookie,
            options: self.options,
            cookie_lifetime: self.cookie_lifetime,
            cookies: None,
        })
    }

    /// # Panics
    ///
    /// When the cookie name is empty or not a valid cookie name.
    pub fn build(self) -> NativeSession<R> {
        self.try_build()
            .unwrap_or_else(|e| panic!("invalid session cookie: {e}"))
    }
}

#[derive(Debug)]
pub enum NativeSessionBuilderError {
    EmptyName,
    InvalidName,
}

impl std::fmt::Display for NativeSessionBuilderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NativeSessionBuilderError::EmptyName => f.write_str("session name is empty"),
            NativeSessionBuilderError::InvalidName => {
                f.write_str("session name can't contain whitespace, ';' or '='")
            }
        }
    }
}

impl std::error::Error for NativeSessionBuilderError {}

#[cfg(test)]
mod native_builder {
    use std::time::Duration;

    use crate::{
        cookie::SameSite,
        session::{
            SessionStorage,
            native::{NativeSession, NativeSessionBuilderError},
        },
    };

    #[test]
    fn defaults() {
        let session = NativeSession::builder().build();
        assert_eq!(session.name(), "session");
        assert_eq!(session.cookie.same_site, Some(SameSite::Strict));
        assert!(session.cookie.secure);
        assert!(session.cookie.http_only);

        let session = NativeSession::builder().use_dev_cookie(true).build();
        assert_eq!(session.name(), "dev-session");
        assert_eq!(session.cookie.same_site, Some(SameSite::Lax));
        assert!(!session.cookie.secure);
    }

    #[test]
    fn names() {
        let session = NativeSession::builder()
            .cookie(|c| c.name = "test".into())
            .dev_cookie(|c| c.name = "not-test".into())
            .build();
        assert_eq!(session.name(), "test");

        let session = NativeSession::builder()
            .cookie(|c| c.name = "not-test".into())
            .dev_cookie(|c| c.name = "test".into())
            .use_dev_cookie(true)
            .build();
        assert_eq!(session.name(), "test");

        let session = NativeSession::builder().name("sid").use_normal_cookie(false).build();
        assert_eq!(session.name(), "sid");
    }

    #[test]
    fn options() {
        let session = NativeSession::builder()
            .strict_mode(false)
            .max_lifetime(Duration::from_secs(60))
            .gc_interval(Duration::from_secs(5))
            .cookie_lifetime(Duration::from_secs(3600))
            .build();

        assert!(!session.options.strict_mode);
        assert_eq!(session.options.max_lifetime, Duration::from_secs(60));
        assert_eq!(session.options.gc_interval, Duration::from_secs(5));
        assert_eq!(session.cookie_lifetime, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn invalid_names() {
        let result = NativeSession::builder().name("").try_build();
        assert!(matches!(result, Err(NativeSessionBuilderError::EmptyName)));

        let result = NativeSession::builder().name("my session").try_build();
        assert!(matches!(result, Err(NativeSessionBuilderError::InvalidName)));
    }
}
