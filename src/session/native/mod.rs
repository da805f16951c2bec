mod builder;
pub mod runtime;

use std::time::Duration;

use anyhow::{anyhow, bail};
use serde_json::Value;

pub use builder::{NativeSessionBuilder, NativeSessionBuilderError};
use runtime::{ErrorRecord, ProcessRuntime, SessionOptions, SessionRuntime};

use crate::{
    StorageResult,
    cookie::{Cookie, Cookies},
    request::Request,
    session::{RequestAware, SessionId, SessionStorage},
    utils::utc_now_secs,
};

/// Session storage driving a [`SessionRuntime`], by default the process wide
/// [`ProcessRuntime`].
///
/// The runtime can report success from `start` and `write_close` while having
/// raised an error. Failures are therefore detected by comparing the runtime's
/// last error before and after the call.
pub struct NativeSession<R = ProcessRuntime> {
    runtime: R,
    cookie: Cookie,
    options: SessionOptions,
    cookie_lifetime: Option<Duration>,
    cookies: Option<Cookies>,
}

impl NativeSession {
    pub fn builder() -> NativeSessionBuilder<ProcessRuntime> {
        NativeSessionBuilder::new()
    }
}

impl<R: SessionRuntime> NativeSession<R> {
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// The session cookie the client sent with the attached request.
    fn requested_cookie(&self) -> Option<Cookie> {
        let cookie = self.cookies.as_ref()?.get(&self.cookie.name)?;

        if cookie.is_invalidated() || cookie.value().is_empty() {
            return None;
        }

        Some(cookie)
    }

    fn issue_cookie(&self, requested: Option<&str>) {
        let (Some(cookies), Some(id)) = (&self.cookies, self.runtime.id()) else {
            return;
        };

        if requested == Some(id.as_str()) {
            return;
        }

        let mut cookie = self.cookie.clone();
        cookie.value = id.to_string();
        cookie.expires = self
            .cookie_lifetime
            .map_or(0, |lifetime| utc_now_secs() + lifetime.as_secs());

        tracing::debug!(name = cookie.name.as_str(), "issuing session cookie");
        cookies.set(cookie);
    }

    fn data_mut(&mut self) -> StorageResult<&mut serde_json::Map<String, Value>> {
        self.runtime
            .data_mut()
            .ok_or_else(|| anyhow!("session is not active or has been destroyed"))
    }
}

fn changed(before: Option<ErrorRecord>, after: Option<ErrorRecord>) -> Option<String> {
    if before == after {
        return None;
    }

    Some(after.map_or_else(|| "unknown error".to_owned(), |e| e.message().to_owned()))
}

impl<R: SessionRuntime> SessionStorage for NativeSession<R> {
    fn open(&mut self) -> StorageResult<()> {
        // Passed on unparsed, the runtime reports ids it can't accept.
        let requested = self.requested_cookie().map(|cookie| cookie.value);
        let Self {
            runtime,
            cookie,
            options,
            ..
        } = self;

        let was_active = runtime.id().is_some();
        let before = runtime.last_error();
        let started =
            runtime.suppressed(|rt| rt.start(&cookie.name, requested.as_deref(), options));
        let after = runtime.last_error();

        if let Some(message) = changed(before, after) {
            if started && !was_active {
                runtime.abort();
            }
            bail!(message);
        }

        if !started {
            bail!("internal session error");
        }

        self.issue_cookie(requested.as_deref());
        Ok(())
    }

    fn close(&mut self) -> StorageResult<()> {
        let before = self.runtime.last_error();
        let closed = self.runtime.suppressed(|rt| rt.write_close());
        let after = self.runtime.last_error();

        if let Some(message) = changed(before, after) {
            bail!(message);
        }

        if !closed {
            bail!("session is not active");
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.cookie.name
    }

    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self
            .runtime
            .data()
            .is_some_and(|data| data.contains_key(key)))
    }

    fn read(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.runtime.data().and_then(|data| data.get(key).cloned()))
    }

    fn write(&mut self, key: &str, value: Value) -> StorageResult<()> {
        self.data_mut()?.insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.data_mut()?.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.data_mut()?.clear();
        Ok(())
    }

    /// Data is written by `close`.
    fn persist(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn destroy(&mut self) -> StorageResult<()> {
        let requested = self
            .requested_cookie()
            .as_ref()
            .and_then(SessionId::from_cookie);

        if !self.runtime.destroy(requested.as_ref()) {
            bail!("failed to destroy session");
        }

        // The removal carries the configured path and domain, otherwise the
        // client keeps its cookie.
        if let Some(cookies) = self.cookies.as_ref().filter(|c| c.has(&self.cookie.name)) {
            let mut removal = self.cookie.clone();
            removal.invalidate();
            cookies.set(removal);
        }

        Ok(())
    }

    fn as_request_aware(&mut self) -> Option<&mut dyn RequestAware> {
        Some(self)
    }
}

impl<R: SessionRuntime> RequestAware for NativeSession<R> {
    fn set_request(&mut self, request: &Request) -> StorageResult<()> {
        self.cookies = Some(request.cookies().clone());
        Ok(())
    }
}

#[cfg(test)]
mod native_session {
    use serde_json::{Map, Value, json};

    use crate::{
        request::Request,
        session::{
            ErrorKind, RequestAware, SessionHandler, SessionId, SessionState, SessionStorage,
            native::{
                NativeSession,
                runtime::{
                    ProcessRuntime, SessionOptions, SessionRuntime, last_error, report_error,
                },
            },
        },
    };

    /// Reports an error while starting, but claims to have succeeded.
    #[derive(Default)]
    struct NoisyRuntime(ProcessRuntime);

    impl SessionRuntime for NoisyRuntime {
        fn start(&mut self, name: &str, requested: Option<&str>, options: &SessionOptions) -> bool {
            report_error("cannot start session after headers have already been sent");
            self.0.start(name, requested, options)
        }

        fn id(&self) -> Option<&SessionId> {
            self.0.id()
        }

        fn data(&self) -> Option<&Map<String, Value>> {
            self.0.data()
        }

        fn data_mut(&mut self) -> Option<&mut Map<String, Value>> {
            self.0.data_mut()
        }

        fn write_close(&mut self) -> bool {
            self.0.write_close()
        }

        fn abort(&mut self) {
            self.0.abort()
        }

        fn destroy(&mut self, requested: Option<&SessionId>) -> bool {
            self.0.destroy(requested)
        }
    }

    fn request(cookie: Option<&str>) -> Request {
        let headers: Vec<(&str, &str)> = cookie.map(|c| ("cookie", c)).into_iter().collect();
        Request::create("GET", "https://example.com/", &headers).unwrap()
    }

    #[test]
    fn open_write_close() {
        let mut session = NativeSession::builder().build();
        session.open().unwrap();
        session.write("user_id", json!(42)).unwrap();

        assert!(session.has("user_id").unwrap());
        assert_eq!(session.read("user_id").unwrap(), Some(json!(42)));

        let id = session.runtime().id().unwrap().clone();
        session.persist().unwrap();
        session.close().unwrap();

        assert_eq!(ProcessRuntime::persisted(&id).unwrap()["user_id"], 42);
    }

    #[test]
    fn read_before_open() {
        let session = NativeSession::builder().build();

        assert!(!session.has("user_id").unwrap());
        assert_eq!(session.read("user_id").unwrap(), None);
    }

    #[test]
    fn write_requires_open() {
        let mut session = NativeSession::builder().build();

        assert!(session.write("x", json!(1)).is_err());
        assert!(session.remove("x").is_err());
        assert!(session.clear().is_err());
    }

    #[test]
    fn open_detects_reported_error() {
        let mut session = NativeSession::builder()
            .runtime(NoisyRuntime::default())
            .build();

        let err = session.open().unwrap_err();
        assert!(err.to_string().contains("headers have already been sent"));
    }

    #[test]
    fn handler_stays_unopened_on_reported_error() {
        let mut handler = SessionHandler::new(
            NativeSession::builder()
                .runtime(NoisyRuntime::default())
                .build(),
        );

        let err = handler.open().unwrap_err();
        assert!(err.to_string().contains("headers have already been sent"));
        assert_eq!(handler.state(), SessionState::Unopened);

        // the runtime was not left running
        let err = handler.open().unwrap_err();
        assert!(!err.to_string().contains("already been started"));
    }

    #[test]
    fn open_reports_invalid_cookie() {
        let request = request(Some("session=../etc/passwd"));
        let mut session = NativeSession::builder().build();
        session.set_request(&request).unwrap();

        let before = last_error();
        let err = session.open().unwrap_err();

        assert_ne!(last_error(), before);
        assert!(err.to_string().contains("illegal characters"));
    }

    #[test]
    fn double_start_is_detected() {
        let mut session = NativeSession::builder().build();
        session.open().unwrap();

        let err = session.open().unwrap_err();
        assert!(err.to_string().contains("already been started"));
    }

    #[test]
    fn close_without_open_fails() {
        let mut session = NativeSession::builder().build();
        assert!(session.close().is_err());
    }

    #[test]
    fn issues_cookie_on_open() {
        let request = request(None);
        let mut session = NativeSession::builder().build();
        session.set_request(&request).unwrap();
        session.open().unwrap();

        let cookie = request.cookies().get("session").unwrap();
        assert_eq!(cookie.value(), session.runtime().id().unwrap().as_str());
        assert!(cookie.is_modified());
        assert!(cookie.secure);
        assert!(cookie.http_only);
        assert_eq!(cookie.expires, 0);
    }

    #[test]
    fn resumes_from_cookie() {
        let mut first = NativeSession::builder().build();
        first.open().unwrap();
        first.write("theme", json!("dark")).unwrap();
        let id = first.runtime().id().unwrap().clone();
        first.close().unwrap();

        let request = request(Some(&format!("session={id}")));
        let mut second = NativeSession::builder().build();
        second.set_request(&request).unwrap();
        second.open().unwrap();

        assert_eq!(second.read("theme").unwrap(), Some(json!("dark")));
        assert!(!request.cookies().get("session").unwrap().is_modified());
    }

    #[test]
    fn destroy_invalidates_cookie() {
        let request = request(None);
        let mut session = NativeSession::builder().build();
        session.set_request(&request).unwrap();
        session.open().unwrap();
        session.write("user_id", json!(1)).unwrap();
        let id = session.runtime().id().unwrap().clone();

        session.destroy().unwrap();
        assert!(!session.has("user_id").unwrap());

        let cookie = request.cookies().get("session").unwrap();
        assert!(cookie.is_modified());
        assert!(cookie.is_invalidated());
        assert_eq!(cookie.path, "/");

        session.destroy().unwrap();
        session.close().unwrap();
        assert!(ProcessRuntime::persisted(&id).is_none());
    }

    #[test]
    fn write_after_destroy_fails() {
        let mut session = NativeSession::builder().build();
        session.open().unwrap();
        let id = session.runtime().id().unwrap().clone();
        session.destroy().unwrap();

        let err = session.write("flash", json!("logged out")).unwrap_err();
        assert!(err.to_string().contains("destroyed"));
        assert_eq!(session.read("flash").unwrap(), None);

        session.close().unwrap();
        assert!(ProcessRuntime::persisted(&id).is_none());
    }

    #[test]
    fn handler_reports_write_after_destroy() {
        let mut handler = SessionHandler::new(NativeSession::builder().build());
        handler.set("user_id", 1).unwrap();
        handler.destroy().unwrap();

        let err = handler.set("flash", "logged out").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Write);
        assert!(!handler.has("flash").unwrap());

        handler.close().unwrap();
        assert_eq!(handler.state(), SessionState::Closed);
    }

    #[test]
    fn destroy_unopened_removes_stored_session() {
        let mut first = NativeSession::builder().build();
        first.open().unwrap();
        let id = first.runtime().id().unwrap().clone();
        first.close().unwrap();

        let request = request(Some(&format!("session={id}")));
        let mut second = NativeSession::builder().build();
        second.set_request(&request).unwrap();
        second.destroy().unwrap();

        assert!(ProcessRuntime::persisted(&id).is_none());
        assert!(request.cookies().get("session").unwrap().is_invalidated());
    }

    #[test]
    fn destroy_without_request() {
        let mut session = NativeSession::builder().build();
        session.destroy().unwrap();
        session.destroy().unwrap();
    }
}
