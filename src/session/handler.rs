use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    request::Request,
    session::{AccessError, CloseError, OpenError, SessionError, SessionStorage},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unopened,
    Open,
    Closed,
}

/// Governs when the underlying storage may be read from, written to or
/// closed.
///
/// The session is opened lazily by the first read or write, and once closed
/// it can not be opened again. A handler that is still open when dropped is
/// closed, so its data is persisted.
pub struct SessionHandler {
    storage: Box<dyn SessionStorage>,
    state: SessionState,
}

impl SessionHandler {
    pub fn new(storage: impl SessionStorage) -> Self {
        Self::from_boxed(Box::new(storage))
    }

    pub fn from_boxed(storage: Box<dyn SessionStorage>) -> Self {
        Self {
            storage,
            state: SessionState::Unopened,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn name(&self) -> &str {
        self.storage.name()
    }

    pub fn open(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Open => return Err(SessionError::Open(OpenError::AlreadyOpen)),
            SessionState::Closed => return Err(SessionError::Open(OpenError::Closed)),
            SessionState::Unopened => {}
        }

        self.storage
            .open()
            .map_err(|e| SessionError::Open(OpenError::Backend(e)))?;
        self.state = SessionState::Open;

        tracing::debug!(name = self.storage.name(), "session opened");
        Ok(())
    }

    /// Persist the session and stop any further reads or writes.
    pub fn close(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Unopened => return Err(SessionError::Close(CloseError::NeverOpened)),
            SessionState::Closed => return Err(SessionError::Close(CloseError::AlreadyClosed)),
            SessionState::Open => {}
        }

        self.storage
            .persist()
            .and_then(|_| self.storage.close())
            .map_err(|e| SessionError::Close(CloseError::Backend(e)))?;
        self.state = SessionState::Closed;

        tracing::debug!(name = self.storage.name(), "session closed");
        Ok(())
    }

    pub fn has(&mut self, key: &str) -> Result<bool, SessionError> {
        self.prepare(key, SessionError::Read)?;

        self.storage
            .has(key)
            .map_err(|e| SessionError::Read(AccessError::Backend(e)))
    }

    pub fn get(&mut self, key: &str) -> Result<Option<Value>, SessionError> {
        self.prepare(key, SessionError::Read)?;

        self.storage
            .read(key)
            .map_err(|e| SessionError::Read(AccessError::Backend(e)))
    }

    /// Read a value and deserialize it into `T`.
    pub fn get_as<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>, SessionError> {
        let Some(value) = self.get(key)? else {
            return Ok(None);
        };

        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| SessionError::Read(AccessError::Backend(e.into())))
    }

    pub fn set(&mut self, key: &str, value: impl Serialize) -> Result<(), SessionError> {
        self.prepare(key, SessionError::Write)?;

        let value = serde_json::to_value(value)
            .map_err(|e| SessionError::Write(AccessError::Backend(e.into())))?;

        self.storage
            .write(key, value)
            .map_err(|e| SessionError::Write(AccessError::Backend(e)))
    }

    pub fn remove(&mut self, key: &str) -> Result<(), SessionError> {
        self.prepare(key, SessionError::Delete)?;

        self.storage
            .remove(key)
            .map_err(|e| SessionError::Delete(AccessError::Backend(e)))
    }

    /// Remove every value from the session.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.prepare_state(SessionError::Delete)?;

        self.storage
            .clear()
            .map_err(|e| SessionError::Delete(AccessError::Backend(e)))
    }

    /// Erase the session and all of its data, whatever state it is in.
    pub fn destroy(&mut self) -> Result<(), SessionError> {
        self.storage
            .destroy()
            .map_err(|e| SessionError::Delete(AccessError::Backend(e)))?;

        tracing::debug!(name = self.storage.name(), "session destroyed");
        Ok(())
    }

    /// Hand the request to the storage, if it asked for it.
    pub fn attach(&mut self, request: &Request) -> Result<(), SessionError> {
        if let Some(storage) = self.storage.as_request_aware() {
            storage.set_request(request).map_err(SessionError::Attach)?;
        }

        Ok(())
    }

    fn prepare(
        &mut self,
        key: &str,
        classify: fn(AccessError) -> SessionError,
    ) -> Result<(), SessionError> {
        if key.is_empty() {
            return Err(classify(AccessError::EmptyKey));
        }

        self.prepare_state(classify)
    }

    fn prepare_state(
        &mut self,
        classify: fn(AccessError) -> SessionError,
    ) -> Result<(), SessionError> {
        match self.state {
            SessionState::Unopened => self.open(),
            SessionState::Open => Ok(()),
            SessionState::Closed => Err(classify(AccessError::Closed)),
        }
    }
}

impl Drop for SessionHandler {
    fn drop(&mut self) {
        if !self.is_open() {
            return;
        }

        if let Err(e) = self.close() {
            tracing::warn!("failed to close session on drop: {e}");
        }
    }
}

impl std::fmt::Debug for SessionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandler")
            .field("name", &self.storage.name())
            .field("state", &self.state)
            .finish()
    }
}
